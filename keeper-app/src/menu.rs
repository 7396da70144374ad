//! Interactive text menu, the default front end when no subcommand is given.

use std::path::PathBuf;

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use keeper_archive::{ArchiveConfig, is_article_url};

use crate::commands::{self, Session};

const ACTIONS: &[&str] = &[
    "Archive an article",
    "List archived articles",
    "List tags",
    "Search by tag",
    "Change output directory",
    "Quit",
];

pub async fn run(session: &mut Session) -> Result<()> {
    let theme = ColorfulTheme::default();
    println!("keeper: archiving into {}", session.archive.output_dir.display());

    loop {
        println!();
        let choice = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(ACTIONS)
            .default(0)
            .interact()?;

        // a failed action is reported and the menu carries on
        let result = match choice {
            0 => crawl(session, &theme).await,
            1 => commands::list(session),
            2 => commands::tags(session),
            3 => search(session, &theme),
            4 => change_output_dir(session, &theme),
            _ => break,
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "app.menu.action_failed");
            eprintln!("error: {err:#}");
        }
    }

    Ok(())
}

async fn crawl(session: &Session, theme: &ColorfulTheme) -> Result<()> {
    let url: String = Input::with_theme(theme)
        .with_prompt("Article URL")
        .interact_text()?;
    let url = url.trim();
    if url.is_empty() {
        return Ok(());
    }
    if !is_article_url(url) {
        eprintln!("{url} is not an mp.weixin.qq.com article link");
        return Ok(());
    }

    let tags: String = Input::with_theme(theme)
        .with_prompt("Tags (comma separated)")
        .allow_empty(true)
        .interact_text()?;

    commands::crawl(session, url, &tags).await
}

fn search(session: &Session, theme: &ColorfulTheme) -> Result<()> {
    let tag: String = Input::with_theme(theme)
        .with_prompt("Tag")
        .allow_empty(true)
        .interact_text()?;
    if tag.trim().is_empty() {
        return Ok(());
    }
    commands::search(session, tag.trim())
}

fn change_output_dir(session: &mut Session, theme: &ColorfulTheme) -> Result<()> {
    let current = session.archive.output_dir.display().to_string();
    let dir: String = Input::with_theme(theme)
        .with_prompt("Output directory")
        .with_initial_text(current)
        .interact_text()?;
    let dir = PathBuf::from(dir.trim());
    tracing::info!(dir = %dir.display(), "app.menu.output_dir_changed");
    session.archive = ArchiveConfig::new(dir);
    println!("Now archiving into {}", session.archive.output_dir.display());
    Ok(())
}
