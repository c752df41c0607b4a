use clap::Parser;
use latticelib::core::Mode;
use latticelib::Site;
use std::path::PathBuf;

use tracing::Level;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::FmtSubscriber;

#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(long, default_value = ".", env = "LATTICE_PROJECT")]
    project: PathBuf,

    #[clap(long, default_value = "build", env = "LATTICE_MODE")]
    mode: Mode,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Render one page to stdout
    Render { destination: String },
    /// List the pages in the sitemap
    List,
}

fn main() -> Result<(), eyre::Report> {
    dotenv::dotenv().ok();
    color_eyre::install()?;

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lattice=info,latticelib=info,lattice_user=info".into()),
        )
        .with_writer(std::io::stderr)
        .finish()
        .with(ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)?;

    let project = args.project.canonicalize()?;
    let site = Site::load(project, args.mode)?;

    match args.command {
        Command::Render { destination } => {
            let page = site.render_page(&destination)?;
            print!("{}", page);
        }
        Command::List => {
            for (_, resource) in site.sitemap() {
                if !resource.is_ignored() {
                    println!("{}", resource.destination_path());
                }
            }
        }
    }

    Ok(())
}
