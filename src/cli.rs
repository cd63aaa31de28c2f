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

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(
    name = "storysearch",
    version,
    about = "Per-locale full-text search over CMS content"
)]
pub struct Cli {
    /// Config file (defaults to the global storysearch.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild locale indexes whose content changed
    Update(LocaleArgs),

    /// Search a locale index
    Search(SearchArgs),

    /// Delete locale indexes
    DeleteIndex(LocaleArgs),

    /// Show index status per locale
    Status {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the update scheduler in the foreground
    Run,
}

#[derive(Args, Debug)]
pub struct LocaleArgs {
    /// Locale to act on (defaults to the first configured locale)
    #[arg(long, conflicts_with = "all")]
    pub locale: Option<String>,

    /// Act on every configured locale
    #[arg(long)]
    pub all: bool,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text
    pub query: String,

    /// Locale to search (defaults to the first configured locale)
    #[arg(long)]
    pub locale: Option<String>,

    /// Role held by the caller (repeatable)
    #[arg(long = "role")]
    pub roles: Vec<String>,

    /// Maximum results (defaults to search.default_limit)
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn locale_and_all_conflict() {
        let parsed = Cli::try_parse_from(["storysearch", "update", "--locale", "de", "--all"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn repeated_roles_collect() {
        let cli = Cli::try_parse_from([
            "storysearch",
            "search",
            "pricing",
            "--role",
            "staff",
            "--role",
            "admin",
            "--config",
            "x.toml",
        ])
        .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.roles, vec!["staff".to_string(), "admin".to_string()]);
                assert_eq!(args.limit, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
