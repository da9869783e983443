use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "Lodestone")]
#[command(version = concat!(env!("VERGEN_GIT_BRANCH"), "/",env!("VERGEN_GIT_SHA")))]
#[command(about = "Resolves assets through configured locators and loaders")]
pub struct CliArgs {
    /// Asset config file with LOADER, LOCATOR and INCLUDE lines
    #[arg(long, env = "LODESTONE_CONFIG")]
    pub config: Option<String>,

    /// Directory to locate assets in, may be given multiple times
    #[arg(long = "root", env = "LODESTONE_ROOT", value_delimiter = ',')]
    pub roots: Vec<String>,

    /// Resolve through the background loader pool
    #[arg(long = "async")]
    pub use_async: bool,

    /// Number of background loader threads, defaults to the number of cores
    #[arg(long, requires = "use_async")]
    pub workers: Option<usize>,

    /// Asset names to resolve
    #[arg(required = true)]
    pub assets: Vec<String>,
}
