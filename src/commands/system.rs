use crate::app::App;
use crate::commands::LockedChat;
use crate::console::read_piped_stdin;
use crate::exceptions::ParleyError;
use crate::history::ChatPath;

pub struct SystemArgs {
    pub chat: Option<String>,
    pub text: Option<String>,
    pub template: Option<String>,
    pub clear: bool,
    pub list_templates: bool,
}

pub fn run(app: &App, args: SystemArgs) -> Result<(), ParleyError> {
    if args.list_templates {
        let names = app.config.list_templates()?;
        if names.is_empty() {
            println!("No system message templates found.");
        }
        for name in names {
            println!("{}", name);
        }
        return Ok(());
    }

    let chat = args
        .chat
        .ok_or_else(|| ParleyError::InvalidInput("A chat path is required.".into()))?;

    let new_text = if args.clear {
        Some(String::new())
    } else if let Some(name) = &args.template {
        Some(app.config.load_template(name)?)
    } else {
        args.text.or_else(read_piped_stdin)
    };

    let Some(text) = new_text else {
        let path = ChatPath::parse(&chat)?;
        match app.store.load_chat(&path)?.system_message() {
            Some(msg) => println!("{}", msg),
            None => println!("No system message set."),
        }
        return Ok(());
    };

    let mut locked = LockedChat::open(app, &chat)?;
    locked.chat.set_system_message(&text);
    locked.save(app)?;

    if locked.chat.system_message().is_some() {
        println!("System message set for '{}'.", locked.path);
    } else {
        println!("System message cleared for '{}'.", locked.path);
    }
    Ok(())
}
