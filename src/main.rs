// Copyright 2026 Storysearch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use storysearch::component::ComponentRegistry;
use storysearch::config::ConfigCtx;
use storysearch::extract::RolePolicy;
use storysearch::extract::StoryExtractor;
use storysearch::output::JsonResponse;
use storysearch::output::UpdateOut;
use storysearch::output::print_json;
use storysearch::output::print_results;
use storysearch::output::print_updates;
use storysearch::scheduler::IndexScheduler;
use storysearch::search::Searcher;
use storysearch::source::ContentSource;
use storysearch::source::DirSource;
use storysearch::store::FieldWeights;
use storysearch::store::IndexStore;
use storysearch::storyblok::StoryblokSource;
use storysearch::updater::IndexUpdater;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::LocaleArgs;
use crate::cli::SearchArgs;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Update(args) => {
            let json = args.json;
            handle_result(cmd_update(config, args), json)
        }
        Commands::Search(args) => {
            let json = args.json;
            handle_result(cmd_search(config, args), json)
        }
        Commands::DeleteIndex(args) => {
            let json = args.json;
            handle_result(cmd_delete_index(config, args), json)
        }
        Commands::Status { json } => handle_result(cmd_status(config, json), json),
        Commands::Run => cmd_run(config),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "storysearch=debug"
    } else {
        "storysearch=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn handle_result(result: Result<()>, json: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                let resp = JsonResponse::error("error", &format!("{err:#}"));
                print_json(&resp)?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn load_ctx(config: Option<&std::path::Path>) -> Result<ConfigCtx> {
    ConfigCtx::load(config)
}

fn open_store(ctx: &ConfigCtx) -> Arc<IndexStore> {
    let weights = FieldWeights {
        title: ctx.config.search.title_weight,
        body: ctx.config.search.body_weight,
    };
    Arc::new(IndexStore::new(ctx.index_dir(), weights))
}

fn build_source(ctx: &ConfigCtx) -> Result<Arc<dyn ContentSource>> {
    let registry = Arc::new(ComponentRegistry::standard());
    let source: Arc<dyn ContentSource> = match ctx.config.source.kind.as_str() {
        "storyblok" => Arc::new(StoryblokSource::new(
            &ctx.config.source,
            &ctx.config.default_locale(),
            registry,
        )?),
        _ => Arc::new(DirSource::new(
            &ctx.content_dir(),
            &ctx.config.source.pattern,
            registry,
        )?),
    };
    Ok(source)
}

fn build_updater(ctx: &ConfigCtx) -> Result<Arc<IndexUpdater>> {
    let extractor = StoryExtractor::new(RolePolicy {
        field: ctx.config.roles.field.clone(),
        slugs: ctx.config.roles.slugs.clone(),
    });
    Ok(Arc::new(IndexUpdater::new(
        build_source(ctx)?,
        Arc::new(extractor),
        open_store(ctx),
    )))
}

fn selected_locales(ctx: &ConfigCtx, args: &LocaleArgs) -> Vec<String> {
    if args.all {
        ctx.config.locales()
    } else {
        vec![
            args.locale
                .clone()
                .unwrap_or_else(|| ctx.config.default_locale()),
        ]
    }
}

fn cmd_update(config: Option<&std::path::Path>, args: LocaleArgs) -> Result<()> {
    let ctx = load_ctx(config)?;
    let updater = build_updater(&ctx)?;
    let updates = if args.all {
        let scheduler = IndexScheduler::new(updater, ctx.config.locales());
        scheduler
            .run_once()
            .iter()
            .map(|outcome| UpdateOut::from_update(&outcome.locale, &outcome.result))
            .collect()
    } else {
        let locale = selected_locales(&ctx, &args).remove(0);
        let docs = updater.update_index(&locale)?;
        vec![UpdateOut::from_update(&locale, &Ok(docs))]
    };

    if args.json {
        let failed = updates.iter().any(|u| u.error.is_some());
        let warnings = updates
            .iter()
            .filter_map(|u| u.error.as_ref().map(|e| format!("{}: {e}", u.locale)))
            .collect();
        let mut resp = JsonResponse::ok().with_updates(updates);
        resp.ok = !failed;
        print_json(&resp.with_warnings(warnings))?;
    } else {
        print_updates(&updates);
    }
    Ok(())
}

fn cmd_search(config: Option<&std::path::Path>, args: SearchArgs) -> Result<()> {
    let ctx = load_ctx(config)?;
    let locale = args
        .locale
        .clone()
        .unwrap_or_else(|| ctx.config.default_locale());
    let limit = args.limit.unwrap_or(ctx.config.search.default_limit).max(1);
    let searcher = Searcher::new(open_store(&ctx)).with_snippet_chars(ctx.config.search.snippet_chars);
    let result = searcher.search(&locale, &args.query, &args.roles, limit);

    if args.json {
        let resp = JsonResponse::ok()
            .with_query(&args.query, &locale, &args.roles, limit)
            .with_search(result);
        print_json(&resp)?;
    } else {
        print_results(&result);
    }
    Ok(())
}

fn cmd_delete_index(config: Option<&std::path::Path>, args: LocaleArgs) -> Result<()> {
    let ctx = load_ctx(config)?;
    let updater = build_updater(&ctx)?;
    let mut updates = Vec::new();
    for locale in selected_locales(&ctx, &args) {
        let existed = updater.delete_index(&locale)?;
        updates.push(UpdateOut::from_delete(&locale, existed));
    }

    if args.json {
        print_json(&JsonResponse::ok().with_updates(updates))?;
    } else {
        print_updates(&updates);
    }
    Ok(())
}

fn cmd_status(config: Option<&std::path::Path>, json: bool) -> Result<()> {
    let ctx = load_ctx(config)?;
    let store = open_store(&ctx);
    let mut locales = ctx.config.locales();
    for locale in store.locales()? {
        if !locales.contains(&locale) {
            locales.push(locale);
        }
    }
    let mut indexes = Vec::with_capacity(locales.len());
    for locale in &locales {
        indexes.push(store.stats(locale)?);
    }

    if json {
        print_json(&JsonResponse::ok().with_indexes(indexes))?;
    } else {
        println!("Index dir: {}", store.root().display());
        for stats in &indexes {
            match &stats.built_at {
                Some(built_at) => println!(
                    "{}: {} docs, built {built_at}, {} bytes",
                    stats.locale, stats.doc_count, stats.db_size_bytes
                ),
                None => println!("{}: not built", stats.locale),
            }
        }
    }
    Ok(())
}

fn cmd_run(config: Option<&std::path::Path>) -> Result<()> {
    let ctx = load_ctx(config)?;
    let scheduler = IndexScheduler::new(build_updater(&ctx)?, ctx.config.locales()).with_timing(
        Duration::from_secs(ctx.config.scheduler.tick_seconds),
        Duration::from_secs(ctx.config.scheduler.interval_seconds),
    );
    let handle = scheduler.spawn()?;
    handle.join();
    Ok(())
}
