//! Site commands.

use crate::cli::Command;
use crate::config::Config;
use crate::docker::DockerClient;
use crate::site::Site;
use crate::site::link::resolve_site;

/// Run a site command against the current (or `--name`d) site.
pub async fn run_site_command(command: &Command, name: Option<&str>) -> anyhow::Result<()> {
    if let Command::Completion(completion) = command {
        return completion.run();
    }
    if let Command::Start(args) = command {
        args.check_name(name)?;
    }

    let mut config = Config::resolve()?;
    resolve_site(&mut config, name)?;
    if let Command::Start(args) = command {
        args.apply(&mut config.site);
    }

    let docker = DockerClient::connect()
        .await?
        .with_exec_timeout(config.exec_timeout);
    let site = Site::new(config, docker);

    match command {
        Command::Start(args) => {
            site.start().await?;
            site.install().await?;
            site.install_default_plugins().await?;
            site.install_xdebug().await?;

            site.verify().await?;
            println!("Your site is running at {}", site.get_url(false));
            if !args.no_open {
                site.open_verified()?;
            }
        }
        Command::Stop => {
            site.stop().await?;
            println!("Site {} stopped", site.identity().name());
        }
        Command::Open => {
            if !site.is_running().await? {
                anyhow::bail!(
                    "Site {} is not running. Start it with 'kana start'",
                    site.identity().name()
                );
            }
            site.open().await?;
        }
        Command::Wp { args } => {
            let output = site.run_wp_cli(args).await?;
            print!("{}", output);
        }
        Command::Plugins => {
            for plugin in site.get_installed_plugins().await? {
                println!("{}", plugin);
            }
        }
        Command::Url { insecure } => {
            println!("{}", site.get_url(*insecure));
        }
        Command::Status => print_status(&site).await?,
        // Handled above.
        Command::Completion(_) => {}
    }

    Ok(())
}

async fn print_status(site: &Site) -> anyhow::Result<()> {
    let identity = site.identity();

    if !site.is_running().await? {
        println!("Site {} is not running", identity.name());
        return Ok(());
    }

    let running = site.running_config().await?;
    println!("Site {} is running", identity.name());
    println!("  URL:       {}", site.get_url(false));
    println!("  Type:      {}", running.site_type);
    println!("  Local:     {}", running.local);
    println!("  Directory: {}", site.config().working_directory.display());
    Ok(())
}
