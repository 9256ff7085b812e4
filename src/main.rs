//! Thin CLI front end (§6 "External interfaces").
//!
//! Resolves one input path, builds a `Context`, installs the operator
//! tables, and runs it as a job-server-encapsulated job. The full CLI flag
//! surface (`-o`, `-d`, `-r`, `--pages`, …) and real output devices (PNG,
//! PDF) are external collaborators; this binary only demonstrates the
//! `OutputDevice` hookup point with a no-op implementation so the display
//! list has somewhere to drain to.

use anyhow::{bail, Context as _};

use postforge_core::context::Context;
use postforge_core::display_list::DisplayList;
use postforge_core::job;
use postforge_core::operators;

/// The seam a real renderer (PNG, PDF, on-screen) plugs into: one call per
/// completed page, receiving the accumulated display-list records.
trait OutputDevice {
    fn show_page(&mut self, display_list: &DisplayList);
}

/// Demonstrates the hookup with no actual rasterization.
struct NullDevice;

impl OutputDevice for NullDevice {
    fn show_page(&mut self, display_list: &DisplayList) {
        tracing::debug!(records = display_list.records.len(), "page complete (null device)");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: postforge <file.ps>");
    };

    let mut ctx = Context::new();
    operators::install(&mut ctx);

    let exit_code = job::execjob(&mut ctx, &path).with_context(|| format!("executing job {}", path))?;

    let mut device = NullDevice;
    device.show_page(&ctx.display_list);

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
