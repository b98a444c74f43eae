use clap::{Args, Parser, Subcommand};

pub mod delete;
pub mod identify;
pub mod list;
pub mod serve;
pub mod show;

pub use delete::run_delete;
pub use identify::run_identify;
pub use list::run_list;
pub use serve::run_serve;
pub use show::run_show;

#[derive(Parser)]
#[command(name = "idlink")]
#[command(about = "Contact identity reconciliation for the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile an identity fragment and print the consolidated view
    Identify(IdentifyArgs),
    /// List contact rows with pagination
    List(ListArgs),
    /// Show the full cluster a contact belongs to
    Show(ShowArgs),
    /// Soft-delete a contact
    Delete(DeleteArgs),
    /// Run the HTTP API
    Serve(serve::ServeArgs),
}

#[derive(Args)]
pub struct IdentifyArgs {
    /// Email address to reconcile
    #[arg(short, long)]
    pub email: Option<String>,
    /// Phone number to reconcile
    #[arg(short, long)]
    pub phone: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(short, long, default_value = "1")]
    pub page: u32,
    #[arg(short, long, default_value = "20")]
    pub limit: u32,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Contact id
    pub id: i64,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Contact id
    pub id: i64,
}
