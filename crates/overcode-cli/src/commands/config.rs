//! `overcode config [--init]` — prints the effective config (defaults
//! merged with whatever's on disk), or writes out the defaults if
//! `--init` is given and nothing exists yet.

use overcode_core::config::Config;
use overcode_daemon::paths;

use crate::cli::ConfigArgs;
use crate::support;

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let path = paths::config_path();

    if args.init {
        if path.exists() {
            anyhow::bail!("{} already exists; remove it first if you want to re-initialize", path.display());
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, Config::default().to_yaml_string()?)?;
        println!("wrote default config to {}", path.display());
        return Ok(());
    }

    let config = support::load_config();
    print!("{}", config.to_yaml_string()?);
    Ok(())
}
