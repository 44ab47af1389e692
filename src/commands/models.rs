use crate::app::App;
use crate::console::{get_terminal_width, print_titled};
use crate::exceptions::ParleyError;
use crate::t2i::generators::IMAGE_MODELS;
use comfy_table::presets::NOTHING;
use comfy_table::*;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_width(get_terminal_width() as u16)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

/// Curated chat models with their resolved provider, or the image models.
pub fn run(app: &App, images: bool) -> Result<(), ParleyError> {
    if images {
        let mut table = new_table(&["Model", "Family", "Aliases"]);
        for model in IMAGE_MODELS {
            table.add_row(vec![
                Cell::new(model.name),
                Cell::new(model.family.to_string()),
                Cell::new(model.aliases.join(", ")),
            ]);
        }
        print_titled("Image Models", &table.to_string());
        return Ok(());
    }

    let mut table = new_table(&["Model", "Provider", "Model ID", "Aliases", "Context"]);
    for name in app.config.models() {
        let section = app.config.models.get(name);
        let aliases = section.map(|m| m.alias.join(", ")).unwrap_or_default();
        let context = section
            .and_then(|m| m.context_window)
            .map(|c| c.to_string())
            .unwrap_or_default();

        let row = match app.config.model_arguments(name) {
            Ok(args) => vec![
                Cell::new(name),
                Cell::new(&args.provider_name),
                Cell::new(&args.model_id),
                Cell::new(aliases),
                Cell::new(context).set_alignment(CellAlignment::Right),
            ],
            Err(e) => {
                tracing::warn!("Model '{}': {}", name, e);
                vec![
                    Cell::new(name),
                    Cell::new("?").fg(Color::Red),
                    Cell::new(""),
                    Cell::new(aliases),
                    Cell::new(context),
                ]
            }
        };
        table.add_row(row);
    }
    print_titled("Curated Models", &table.to_string());
    Ok(())
}
