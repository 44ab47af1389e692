use clap::CommandFactory;
use clap::{Parser, Subcommand};
use clap_complete::ArgValueCompleter;
use clap_complete::CompletionCandidate;
use parley::app::App;
use parley::commands;
use parley::commands::history_cmds::CutMode;
use parley::commands::system::SystemArgs;
use parley::consts::{DEFAULT_PROPERTIES_PATH, PROPERTIES_ENV};
use parley::utils::setup_crypto_provider;
use std::path::PathBuf;

// Use jemalloc on musl x86_64 for better performance
#[cfg(all(target_env = "musl", target_arch = "x86_64"))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Chat with hosted LLM providers from the terminal",
    long_about = None,
    version = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        "\n\n",
        "Build Information:\n",
        "  Timestamp:         ", env!("VERGEN_BUILD_TIMESTAMP"), "\n",
        "  Target Triple:     ", env!("VERGEN_CARGO_TARGET_TRIPLE"), "\n",
        "\n",
        "Source Control:\n",
        "  Commit SHA:        ", env!("VERGEN_GIT_SHA"), "\n",
        "  Commit Timestamp:  ", env!("VERGEN_GIT_COMMIT_TIMESTAMP"), "\n",
        "  Branch:            ", env!("VERGEN_GIT_BRANCH"), "\n",
        "\n",
        "Compiler:\n",
        "  Rustc Version:     ", env!("VERGEN_RUSTC_SEMVER"), "\n",
        "  Rustc Channel:     ", env!("VERGEN_RUSTC_CHANNEL"), "\n",
        "  Host Triple:       ", env!("VERGEN_RUSTC_HOST_TRIPLE"), "\n"
    ),
    disable_help_subcommand = true
)]
struct Cli {
    /// Path to the properties (INI) file.
    #[arg(
        short,
        long,
        global = true,
        env = PROPERTIES_ENV,
        default_value = DEFAULT_PROPERTIES_PATH,
        value_hint = clap::ValueHint::FilePath
    )]
    properties: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project. Nested paths need an existing parent.
    New { path: String },
}

#[derive(Subcommand)]
enum ChatCommands {
    /// Create an empty chat. Without a name at the root, the next free
    /// `Chat N` is used.
    New {
        name: Option<String>,
        /// Project to create the chat in.
        #[arg(long, add = ArgValueCompleter::new(path_completer))]
        project: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeysCommands {
    /// List providers with masked keys.
    List,
    /// Store a key. Reads it from stdin when omitted.
    Set { provider: String, key: Option<String> },
    /// Remove a stored key.
    Remove { provider: String },
}

#[derive(Subcommand)]
enum Commands {
    /// Print the project and chat tree.
    Tree {
        #[arg(long)]
        json: bool,
    },

    /// Manage projects.
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Manage chats.
    #[command(subcommand)]
    Chat(ChatCommands),

    /// Rename a chat or project within its parent.
    Rename {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        path: String,
        new_name: String,
    },

    /// Delete a chat or project.
    Delete {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        path: String,
        /// Delete a project together with its contents.
        #[arg(long)]
        force: bool,
    },

    /// Print the messages of a chat with their indices.
    Show {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        chat: String,
        /// Output the messages as JSON
        #[arg(long)]
        json: bool,
        /// Print the system message instead
        #[arg(long)]
        system: bool,
    },

    /// Send a prompt and stream the reply. Piped stdin is appended to the
    /// prompt; without a prompt the stored draft is sent.
    Send {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        chat: String,
        prompt: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Store a draft user message without sending it.
    Draft {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        chat: String,
        text: Option<String>,
    },

    /// Answer a message again.
    ///
    /// On an assistant reply, the reply is replaced. On a user message, the
    /// next assistant reply after it is replaced.
    Regenerate {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        chat: String,
        #[arg(allow_negative_numbers = true)]
        index: isize,
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Ask for a revised assistant reply taking COMMENT into account.
    Refine {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        chat: String,
        #[arg(allow_negative_numbers = true)]
        index: isize,
        comment: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Open a message in your default editor ($EDITOR) to make corrections.
    Edit {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        chat: String,
        #[arg(default_value = "-1", allow_negative_numbers = true)]
        index: isize,
    },

    /// Remove messages from a chat.
    Cut {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        chat: String,
        #[arg(allow_negative_numbers = true)]
        index: isize,
        /// Remove the user message and the reply that follows it
        #[arg(long, conflicts_with = "below")]
        pair: bool,
        /// Remove this message and everything after it
        #[arg(long)]
        below: bool,
    },

    /// Copy a chat to a new path, optionally truncated.
    Fork {
        #[arg(add = ArgValueCompleter::new(path_completer))]
        chat: String,
        new_path: String,
        /// Keep messages up to and including this index
        #[arg(long, allow_negative_numbers = true)]
        until: Option<isize>,
    },

    /// Show or set the system message of a chat.
    System {
        #[arg(
            required_unless_present = "list_templates",
            add = ArgValueCompleter::new(path_completer)
        )]
        chat: Option<String>,
        text: Option<String>,
        /// Use a template from the configured templates directory
        #[arg(long, conflicts_with_all = ["text", "clear"])]
        template: Option<String>,
        /// Remove the system message
        #[arg(long, conflicts_with = "text")]
        clear: bool,
        /// List available templates
        #[arg(long)]
        list_templates: bool,
    },

    /// Manage API keys.
    #[command(subcommand)]
    Keys(KeysCommands),

    /// List curated models.
    Models {
        /// List image generation models instead
        #[arg(long)]
        images: bool,
    },

    /// Generate an image from a prompt.
    Imagine {
        prompt: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
        /// Output file; the image extension is appended when missing
        #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
        output: Option<PathBuf>,
        /// Print the image URL instead of downloading it, when the provider returns one
        #[arg(long)]
        url_only: bool,
    },

    /// Show instructions for enabling shell completions.
    Completions,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    setup_crypto_provider();

    clap_complete::CompleteEnv::with_factory(Cli::command).complete();

    let cli = Cli::parse();

    if let Commands::Completions = cli.command {
        println!(
            "Bash:\n\
            echo \"source <(COMPLETE=bash parley)\" >> ~/.bashrc\n\
            \n\
            Elvish:\n\
            echo \"eval (E:COMPLETE=elvish parley | slurp)\" >> ~/.elvish/rc.elv\n\
            \n\
            Fish:\n\
            echo \"COMPLETE=fish parley | source\" >> ~/.config/fish/config.fish\n\
            \n\
            Zsh:\n\
            echo \"source <(COMPLETE=zsh parley)\" >> ~/.zshrc\n"
        );
        return;
    }

    let app = match App::bootstrap(&cli.properties) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Tree { json } => commands::tree::run(&app, json),
        Commands::Project(ProjectCommands::New { path }) => {
            commands::history_cmds::project_new(&app, &path)
        }
        Commands::Chat(ChatCommands::New { name, project }) => {
            commands::history_cmds::chat_new(&app, name, project)
        }
        Commands::Rename { path, new_name } => {
            commands::history_cmds::rename(&app, &path, &new_name)
        }
        Commands::Delete { path, force } => commands::history_cmds::delete(&app, &path, force),
        Commands::Show { chat, json, system } => commands::show::run(&app, &chat, json, system),
        Commands::Send {
            chat,
            prompt,
            model,
        } => commands::llm_shared::send(&app, &chat, prompt, model).await,
        Commands::Draft { chat, text } => commands::llm_shared::draft(&app, &chat, text),
        Commands::Regenerate { chat, index, model } => {
            commands::llm_shared::regenerate(&app, &chat, index, model).await
        }
        Commands::Refine {
            chat,
            index,
            comment,
            model,
        } => commands::llm_shared::refine(&app, &chat, index, comment, model).await,
        Commands::Edit { chat, index } => commands::edit::run(&app, &chat, index),
        Commands::Cut {
            chat,
            index,
            pair,
            below,
        } => {
            let mode = match (pair, below) {
                (true, _) => CutMode::Pair,
                (_, true) => CutMode::Below,
                _ => CutMode::Single,
            };
            commands::history_cmds::cut(&app, &chat, index, mode)
        }
        Commands::Fork {
            chat,
            new_path,
            until,
        } => commands::history_cmds::fork(&app, &chat, &new_path, until),
        Commands::System {
            chat,
            text,
            template,
            clear,
            list_templates,
        } => commands::system::run(
            &app,
            SystemArgs {
                chat,
                text,
                template,
                clear,
                list_templates,
            },
        ),
        Commands::Keys(KeysCommands::List) => commands::keys::list(&app),
        Commands::Keys(KeysCommands::Set { provider, key }) => {
            commands::keys::set(&app, &provider, key)
        }
        Commands::Keys(KeysCommands::Remove { provider }) => {
            commands::keys::remove(&app, &provider)
        }
        Commands::Models { images } => commands::models::run(&app, images),
        Commands::Imagine {
            prompt,
            model,
            output,
            url_only,
        } => commands::imagine::run(&app, prompt, model, output, url_only).await,
        Commands::Completions => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Chat and project paths below the configured history root.
fn path_completer(current: &std::ffi::OsStr) -> Vec<CompletionCandidate> {
    let properties = properties_from_args(std::env::args())
        .or_else(|| std::env::var(PROPERTIES_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROPERTIES_PATH));
    if !properties.is_file() {
        return vec![];
    }
    let Ok(config) = parley::config::Config::load(&properties) else {
        return vec![];
    };
    if !config.chat_history_root().is_dir() {
        return vec![];
    }
    let Ok(store) = parley::history::HistoryStore::open(config.chat_history_root()) else {
        return vec![];
    };

    let current_input = current.to_string_lossy();
    store
        .chat_paths()
        .unwrap_or_default()
        .into_iter()
        .filter(|p| p.starts_with(current_input.as_ref()))
        .map(CompletionCandidate::new)
        .collect()
}

/// The `-p/--properties` value on the command line being completed, if any.
fn properties_from_args(args: impl IntoIterator<Item = String>) -> Option<PathBuf> {
    let mut found = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "-p" || arg == "--properties" {
            if let Some(value) = args.next() {
                found = Some(PathBuf::from(value));
            }
        } else if let Some(value) = arg.strip_prefix("--properties=") {
            found = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("-p")
            && !value.is_empty()
            && !arg.starts_with("--")
        {
            found = Some(PathBuf::from(value));
        }
    }
    found
}
