use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use listing_portal::domain::Role;
use listing_portal::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Listing Portal",
    about = "Run the listing portal API and manage its accounts from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Manage portal accounts in the configured database
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Walk through the agent access request workflow against an in-memory store
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    /// Provision an admin or agent account
    Add(UserAddArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct UserAddArgs {
    /// Display name
    #[arg(long)]
    pub(crate) name: String,
    /// Login email; stored trimmed and lowercased
    #[arg(long)]
    pub(crate) email: String,
    /// Initial password, stored as a bcrypt hash
    #[arg(long)]
    pub(crate) password: String,
    /// Either `admin` or `agent`
    #[arg(long, default_value = "agent", value_parser = parse_role)]
    pub(crate) role: Role,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse::<Role>().map_err(|err| err.to_string())
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::User {
            command: UserCommand::Add(args),
        } => server::add_user(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_add_parses_role() {
        let cli = Cli::try_parse_from([
            "listing-portal",
            "user",
            "add",
            "--name",
            "Rim",
            "--email",
            "rim@agency.test",
            "--password",
            "change-me",
            "--role",
            "admin",
        ])
        .expect("arguments parse");

        match cli.command {
            Some(Command::User {
                command: UserCommand::Add(args),
            }) => {
                assert_eq!(args.role, Role::Admin);
                assert_eq!(args.email, "rim@agency.test");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result = Cli::try_parse_from([
            "listing-portal",
            "user",
            "add",
            "--name",
            "Rim",
            "--email",
            "rim@agency.test",
            "--password",
            "change-me",
            "--role",
            "owner",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["listing-portal"]).expect("arguments parse");
        assert!(cli.command.is_none());
    }
}
