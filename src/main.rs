use clap::{Parser, Subcommand};
use doc_qa::commands::{
    add_document, ask_question, clear_all, delete_document, list_documents, open_library,
    show_status,
};
use doc_qa::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doc-qa")]
#[command(about = "Ask questions about your documents, answered by a local LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Upload a document and index it
    Add {
        /// Path to a .txt, .md or .csv file
        path: PathBuf,
    },
    /// List uploaded documents
    List,
    /// Delete a document and its indexed content
    Delete {
        /// Document ID
        id: i64,
    },
    /// Delete every document and the search index
    Clear {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Ask a question about the uploaded documents
    Ask {
        /// The question, quoted or as separate words
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Show provider health and index status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Add { path } => {
            add_document(&open_library().await?, &path).await?;
        }
        Commands::List => {
            list_documents(&open_library().await?).await?;
        }
        Commands::Delete { id } => {
            delete_document(&open_library().await?, id).await?;
        }
        Commands::Clear { yes } => {
            clear_all(&open_library().await?, yes).await?;
        }
        Commands::Ask { question } => {
            ask_question(&open_library().await?, &question.join(" ")).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["doc-qa", "list"]).expect("list should parse");
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn add_command_with_path() {
        let cli = Cli::try_parse_from(["doc-qa", "add", "notes/sky.txt"]).expect("add should parse");
        match cli.command {
            Commands::Add { path } => assert_eq!(path, PathBuf::from("notes/sky.txt")),
            _ => panic!("expected add command"),
        }
    }

    #[test]
    fn delete_requires_numeric_id() {
        let cli = Cli::try_parse_from(["doc-qa", "delete", "7"]).expect("delete should parse");
        assert!(matches!(cli.command, Commands::Delete { id: 7 }));

        let err = Cli::try_parse_from(["doc-qa", "delete", "seven"])
            .err()
            .expect("non-numeric id should fail");
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn ask_joins_words() {
        let cli = Cli::try_parse_from(["doc-qa", "ask", "what", "colour", "is", "the", "sky?"])
            .expect("ask should parse");
        match cli.command {
            Commands::Ask { question } => assert_eq!(question.join(" "), "what colour is the sky?"),
            _ => panic!("expected ask command"),
        }

        assert!(Cli::try_parse_from(["doc-qa", "ask"]).is_err());
    }

    #[test]
    fn clear_yes_flag() {
        let cli = Cli::try_parse_from(["doc-qa", "clear", "--yes"]).expect("clear should parse");
        assert!(matches!(cli.command, Commands::Clear { yes: true }));

        let cli = Cli::try_parse_from(["doc-qa", "clear"]).expect("clear should parse");
        assert!(matches!(cli.command, Commands::Clear { yes: false }));
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["doc-qa", "config", "--show"]).expect("config should parse");
        assert!(matches!(cli.command, Commands::Config { show: true }));
    }

    #[test]
    fn invalid_command() {
        let err = Cli::try_parse_from(["doc-qa", "serve"])
            .err()
            .expect("unknown subcommand should fail");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn help_message() {
        let err = Cli::try_parse_from(["doc-qa", "--help"])
            .err()
            .expect("help exits early");
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}
