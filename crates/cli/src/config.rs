use casekeep_session::AppConfig;
use clap::Subcommand;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::path::Path;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print where the configuration file lives
    Path,
}

/// # Errors
///
/// Returns an error if the configuration cannot be read, parsed or written.
pub fn handle_config_command(cmd: &ConfigCommand, path: &Path) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let config = AppConfig::load_or_default(path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if !path.exists() {
                println!("(defaults; no file at {})", path.display());
            }
        }
        ConfigCommand::Init { force } => {
            init_config(path, *force)?;
            println!("✅ Wrote default configuration to {}", path.display());
        }
        ConfigCommand::Path => println!("{}", path.display()),
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(eyre!(
            "Configuration already exists at {}. Use --force to overwrite it.",
            path.display()
        ));
    }
    AppConfig::default().save_to(path)?;
    Ok(())
}
