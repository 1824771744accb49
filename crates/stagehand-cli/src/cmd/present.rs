use crate::output::{print_json, print_result};
use anyhow::Context;
use serde::Serialize;
use stagehand_core::deck::Deck;
use stagehand_core::history::NavigationMethod;
use stagehand_core::paths;
use stagehand_core::{ExecuteOptions, ExecutionResult};
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SlideRun {
    slide: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    results: Vec<ExecutionResult>,
}

pub fn run(root: &Path, deck: Option<&Path>, trusted: bool, json: bool) -> anyhow::Result<()> {
    let deck_path = match deck {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => root.join(p),
        None => paths::default_deck_path(root),
    };
    let deck = Deck::load(&deck_path)
        .with_context(|| format!("failed to load deck {}", deck_path.display()))?;

    let (_workbench, mut session) = super::open_session(root, trusted)?;
    session.load_deck(deck);
    let slide_count = session.deck().map(Deck::len).unwrap_or(0);

    let rt = super::runtime()?;
    let runs = rt.block_on(async {
        let options = ExecuteOptions::default();
        let mut runs = Vec::with_capacity(slide_count);
        for slide in 0..slide_count {
            session
                .navigate(slide, NavigationMethod::Sequential, None)
                .await;
            let results = session.run_slide(slide, &options).await?;
            runs.push(SlideRun {
                slide: slide + 1,
                title: session.deck().and_then(|d| d.title_of(slide)),
                results,
            });
        }
        anyhow::Ok(runs)
    })?;

    if json {
        print_json(&runs)?;
    } else {
        for run in &runs {
            match &run.title {
                Some(title) => println!("== Slide {}: {title}", run.slide),
                None => println!("== Slide {}", run.slide),
            }
            let steps = session
                .deck()
                .and_then(|d| d.slide(run.slide - 1))
                .and_then(|s| s.actions().ok())
                .unwrap_or_default();
            for (i, result) in run.results.iter().enumerate() {
                let label = match (steps.get(i), &result.target) {
                    (Some(step), Some(target)) => format!("{} {target}", step.action_type),
                    (Some(step), None) => step.action_type.clone(),
                    (None, _) => format!("action {}", i + 1),
                };
                print_result(&label, result);
            }
        }
    }

    let failed = runs
        .iter()
        .flat_map(|r| &r.results)
        .filter(|r| !r.success)
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} action(s) failed across {slide_count} slide(s)");
    }
    Ok(())
}
