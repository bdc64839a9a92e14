//! `vue-lynx serve`: serve artifacts over HTTP.

use crate::output::StyledOutput;
use anyhow::Context;
use std::path::PathBuf;

pub fn execute(out: &mut StyledOutput, port: u16, dir: PathBuf) -> anyhow::Result<()> {
    if !dir.is_dir() {
        out.warning("Warning: ");
        out.line(&format!("{} does not exist yet; every request will 404", dir.display()));
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        let listener = vue_lynx_pack::server::bind(port)
            .await
            .with_context(|| format!("Failed to bind port {}", port))?;
        out.info(&format!("Serving {} at http://localhost:{}/", dir.display(), port));
        out.newline();
        vue_lynx_pack::serve(listener, dir).await?;
        Ok::<(), anyhow::Error>(())
    })
}
