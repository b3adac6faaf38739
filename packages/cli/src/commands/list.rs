use super::Context;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use folio_editor::EditorCommand;
use serde::Serialize;

#[derive(Debug, Args)]
pub struct CommandsArgs {
    /// Print the commands as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommandInfo<'a> {
    id: &'a str,
    keymap: &'a [String],
}

/// List the commands an editor built from the current configuration offers
pub async fn commands(args: CommandsArgs, ctx: &Context) -> Result<()> {
    let editor = ctx.editor().await?;
    let commands = editor.commands()?;

    if args.json {
        let info: Vec<CommandInfo<'_>> = commands
            .iter()
            .map(|c| CommandInfo {
                id: c.id(),
                keymap: c.keymap(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!(
            "{} commands for {}",
            commands.len().to_string().bold(),
            ctx.config.editor.format.bright_blue()
        );
        print!("{}", render_commands(&commands));
    }
    editor.destroy();
    Ok(())
}

pub fn render_commands(commands: &[EditorCommand]) -> String {
    let width = commands.iter().map(|c| c.id().len()).max().unwrap_or(0);
    let mut out = String::new();
    for command in commands {
        let keys = if command.keymap().is_empty() {
            "-".dimmed().to_string()
        } else {
            command.keymap().join(", ")
        };
        out.push_str(&format!("  {:width$}  {}\n", command.id(), keys, width = width));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builtin_context;

    #[tokio::test]
    async fn test_render_commands() {
        colored::control::set_override(false);
        let ctx = builtin_context();
        let editor = ctx.editor().await.unwrap();
        let rendered = render_commands(&editor.commands().unwrap());
        let bold = rendered.lines().find(|l| l.trim_start().starts_with("bold ")).unwrap();
        assert!(bold.ends_with("Ctrl+B"));
    }
}
