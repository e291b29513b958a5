//! CLI command handling.
//!
//! Provides subcommands for:
//! - Starting a site and finishing its WordPress setup (`start`)
//! - Stopping a site (`stop`)
//! - Opening a site in the browser (`open`)
//! - Running wp-cli against a site (`wp`)
//! - Listing installed plugins (`plugins`)
//! - Printing the site URL (`url`)
//! - Reporting whether a site is running (`status`)
//! - Generating shell completions (`completion`)

mod completion;
mod site;

pub use completion::Completion;
pub use site::run_site_command;

use clap::{Args, ColorChoice, Parser, Subcommand};

use crate::config::{SiteOptions, SiteType};
use crate::site::SiteError;

#[derive(Parser, Debug)]
#[command(name = "kana")]
#[command(about = "Local WordPress development environments on Docker")]
#[command(
    long_about = "kana runs WordPress sites, plugins and themes in local containers.\nExamples:\n  kana start --plugin  # Develop the plugin in the current directory\n  kana wp plugin list  # Run wp-cli against the site"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Operate on a named site instead of the current directory
    #[arg(short, long, global = true)]
    pub name: Option<String>,

    /// Log engine calls and other details
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the site
    #[command(
        about = "Start a WordPress development site",
        long_about = "Starts the containers, installs WordPress and opens the site.\nExample: kana start --theme --xdebug"
    )]
    Start(StartArgs),

    /// Stop the site
    #[command(about = "Stop the WordPress development site")]
    Stop,

    /// Open the site in the default browser
    #[command(about = "Open the site in your browser")]
    Open,

    /// Run a wp-cli command against the site
    #[command(
        about = "Run a wp-cli command",
        long_about = "Runs wp-cli in a one-shot container against the site.\nExample: kana wp option get blogname"
    )]
    Wp {
        /// Arguments passed to wp
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },

    /// List plugins installed on the site
    #[command(about = "List installed plugins")]
    Plugins,

    /// Print the site URL
    #[command(about = "Print the site URL")]
    Url {
        /// Print the plain HTTP URL
        #[arg(long)]
        insecure: bool,
    },

    /// Report whether the site is running
    #[command(about = "Show site status")]
    Status,

    /// Generate shell completions
    #[command(about = "Generate shell completions")]
    Completion(Completion),
}

/// Flags of `kana start`.
#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Mount the current directory as a plugin
    #[arg(long, conflicts_with = "theme")]
    pub plugin: bool,

    /// Mount the current directory as a theme
    #[arg(long)]
    pub theme: bool,

    /// Serve WordPress from ./wordpress instead of the managed app directory
    #[arg(long)]
    pub local: bool,

    /// Install and enable Xdebug
    #[arg(long)]
    pub xdebug: bool,

    /// Don't open the browser once the site is up
    #[arg(long)]
    pub no_open: bool,
}

impl StartArgs {
    /// Named sites have no project directory to mount.
    pub fn check_name(&self, name: Option<&str>) -> Result<(), SiteError> {
        if name.is_some() && (self.plugin || self.theme || self.local) {
            return Err(SiteError::InvalidFlags(
                "'plugin' 'theme' and 'local' flags are not valid with named sites".to_string(),
            ));
        }
        Ok(())
    }

    /// Layer these flags over the configured options.
    pub fn apply(&self, options: &mut SiteOptions) {
        if self.plugin {
            options.site_type = SiteType::Plugin;
        }
        if self.theme {
            options.site_type = SiteType::Theme;
        }
        if self.local {
            options.local = true;
        }
        if self.xdebug {
            options.xdebug = true;
        }
    }
}
