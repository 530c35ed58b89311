//! `ollamify config init`

use std::fs;
use std::path::Path;

use crate::cli::ConfigInitArgs;
use crate::config::ConfigError;

/// Annotated configuration with every default spelled out.
pub const EXAMPLE_CONFIG: &str = include_str!("../../ollamify.example.toml");

/// Write the bundled example configuration to `path`.
///
/// Refuses to replace an existing file unless `force` is set. Missing parent
/// directories are created.
pub fn write_example_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::Validation {
            field: "output".to_string(),
            message: format!("{} already exists; pass --force to overwrite", path.display()),
        });
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, EXAMPLE_CONFIG)?;
    Ok(())
}

pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    write_example_config(&args.output, args.force)?;

    println!("✓ Wrote {}", args.output.display());
    println!("  Add [[friendly_servers]] entries to enable peer routing.");
    Ok(())
}
