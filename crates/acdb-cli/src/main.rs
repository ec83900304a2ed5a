use std::path::PathBuf;

use acdb_core::Bucket;
use acdb_reconcile::{
    backfill::run_backfill, repair::run_fix_invalid, resolve::run_resolve, run_merge,
    split::run_split, standardize::run_standardize, FieldRenameRules, ReconcileConfig, Reconciler,
    WorkTypeRules,
};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILTER: &str = "acdb=info,acdb_reconcile=info,acdb_sources=info,acdb_storage=info";

#[derive(Debug, Parser)]
#[command(name = "acdb")]
#[command(about = "Reconcile harvested AI character entries into one canonical database")]
#[command(version)]
struct Cli {
    /// Directory whose top-level JSON files are the inputs
    #[arg(long, global = true, env = "ACDB_WORKSPACE_ROOT")]
    root: Option<PathBuf>,

    /// Where bucket files are written (defaults to the root)
    #[arg(long, global = true, env = "ACDB_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory holding field_renames.yaml and work_types.yaml
    #[arg(long, global = true, env = "ACDB_RULES_DIR")]
    rules_dir: Option<PathBuf>,

    /// Do not copy files to backups/ before overwriting them
    #[arg(long, global = true)]
    no_backup: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Merge every source file into the canonical file and the four review buckets
    Merge(MergeArgs),
    /// Collapse the duplicate bucket with the pairwise merge
    ResolveDuplicates(DryRun),
    /// Rename legacy fields in the invalid bucket into fixed-entries.json
    FixInvalid(DryRun),
    /// Fill gaps in canonical entries from matching incomplete entries
    Backfill(DryRun),
    /// Apply work type resolutions and renames to the canonical file
    Standardize(DryRun),
    /// Split the canonical file by work type for progressive loading
    Split(DryRun),
}

#[derive(Debug, Default, Args)]
struct MergeArgs {
    /// Also scan the batches/ tree for source files
    #[arg(short = 'b', long)]
    batches: bool,

    /// Report what would be written without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Rename legacy fields (year, work, name, film) before validation
    #[arg(long)]
    apply_renames: bool,

    /// Do not split the canonical file after a successful merge
    #[arg(long)]
    skip_split: bool,
}

#[derive(Debug, Default, Args)]
struct DryRun {
    /// Report what would change without touching any file
    #[arg(long)]
    dry_run: bool,
}

fn config_from(cli: &Cli) -> ReconcileConfig {
    let mut config = ReconcileConfig::from_env();
    if let Some(root) = &cli.root {
        config = config.with_workspace_root(root);
    }
    if let Some(dir) = &cli.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(dir) = &cli.rules_dir {
        config.rules_dir = dir.clone();
    }
    if cli.no_backup {
        config.backups = false;
    }
    config
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = config_from(&cli);

    match cli.command.unwrap_or_else(|| Commands::Merge(MergeArgs::default())) {
        Commands::Merge(args) => {
            config.include_batches = args.batches;
            config.dry_run = args.dry_run;
            config.apply_renames = args.apply_renames;
            config.split_after_merge = !args.skip_split;
            info!(root = %config.workspace_root.display(), "starting merge");

            let reconciler = Reconciler::from_config(&config)?;
            let summary = run_merge(&config, &reconciler)?;
            let stats = &summary.stats;
            println!(
                "merge complete: run_id={} files={} loaded={} skipped={} entries={} identical_removed={}",
                summary.run_id,
                summary.source_files,
                summary.loaded_files,
                summary.skipped_files.len(),
                stats.loaded_entries,
                stats.exact_duplicates_removed
            );
            for bucket in Bucket::ALL {
                let count = match bucket {
                    Bucket::Valid => stats.valid,
                    Bucket::Invalid => stats.invalid,
                    Bucket::Incomplete => stats.incomplete,
                    Bucket::MultiWork => stats.multi_work,
                    Bucket::Duplicate => stats.duplicate,
                };
                println!("  {:<12} {:>6}  {}", bucket.as_str(), count, bucket.file_name());
            }
            println!(
                "  merged {} same-fact groups ({} entries absorbed)",
                stats.merged_groups, stats.merged_away
            );
            for path in &summary.skipped_files {
                println!("  skipped {}", path.display());
            }
            if summary.dry_run {
                println!("dry run: no files were written");
            } else {
                println!(
                    "wrote {} files, {} backups",
                    summary.written.len(),
                    summary.backups.len()
                );
            }
            if let Some(split) = &summary.split {
                println!(
                    "split {} characters into {} work type files (version {})",
                    split.total_characters, split.work_types, split.version
                );
            }
        }
        Commands::ResolveDuplicates(args) => {
            config.dry_run = args.dry_run;
            let summary = run_resolve(&config)?;
            println!(
                "resolve complete: {} -> {} entries, {} groups merged ({})",
                summary.entries_before,
                summary.entries_after,
                summary.groups_merged,
                summary.path.display()
            );
            print_dry_run(config.dry_run);
        }
        Commands::FixInvalid(args) => {
            config.dry_run = args.dry_run;
            let rules = FieldRenameRules::from_rules_dir(&config.rules_dir)?;
            let summary = run_fix_invalid(&config, &rules)?;
            println!(
                "fix-invalid complete: {} entries, {} now fit the schema, {} still invalid -> {}",
                summary.total,
                summary.now_valid,
                summary.still_invalid(),
                summary.output.display()
            );
            for rename in &rules.renames {
                println!("  {} -> {}", rename.from, rename.to);
            }
            for field in &rules.drop_fields {
                println!("  dropped {field}");
            }
            print_dry_run(config.dry_run);
        }
        Commands::Backfill(args) => {
            config.dry_run = args.dry_run;
            let summary = run_backfill(&config)?;
            println!(
                "backfill complete: {} matches, {} fields added to {} entries, incomplete {} -> {}",
                summary.matched.len(),
                summary.fields_added(),
                summary.updates.len(),
                summary.incomplete_before,
                summary.incomplete_after
            );
            for update in &summary.updates {
                let fields = update
                    .fields
                    .iter()
                    .map(|f| f.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!(
                    "  {} from {} ({}): {}",
                    update.key.character_name, update.key.work_name, update.key.work_type, fields
                );
            }
            print_dry_run(config.dry_run);
        }
        Commands::Standardize(args) => {
            config.dry_run = args.dry_run;
            let rules = WorkTypeRules::from_rules_dir(&config.rules_dir)?;
            let summary = run_standardize(&config, &rules)?;
            let report = &summary.report;
            println!(
                "standardize complete: {} -> {} work types, {} ambiguous fixed, {} entries mapped",
                report.before.len(),
                report.after.len(),
                report.ambiguous.len(),
                report.entries_mapped()
            );
            for change in &report.ambiguous {
                println!(
                    "  {} from {}: {} -> {}",
                    change.character_name, change.work_name, change.from, change.to
                );
            }
            for mapping in &report.mapped {
                println!("  {} -> {}: {} entries", mapping.from, mapping.to, mapping.entries);
            }
            for (work_type, count, before) in report.top_after(15) {
                match before {
                    Some(before) => println!("  {count:>4}  {work_type} (was {before})"),
                    None => println!("  {count:>4}  {work_type}"),
                }
            }
            print_dry_run(config.dry_run);
        }
        Commands::Split(args) => {
            config.dry_run = args.dry_run;
            let summary = run_split(&config)?;
            println!(
                "split complete: {} characters, {} work types, version {}",
                summary.total_characters, summary.work_types, summary.version
            );
            for path in &summary.written {
                println!("  {}", path.display());
            }
            print_dry_run(config.dry_run);
        }
    }

    Ok(())
}

fn print_dry_run(dry_run: bool) {
    if dry_run {
        println!("dry run: no files were written");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_the_default_command() {
        let cli = Cli::try_parse_from(["acdb"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn merge_flags_parse() {
        let cli = Cli::try_parse_from(["acdb", "merge", "-b", "--dry-run", "--skip-split"])
            .expect("parse");
        match cli.command {
            Some(Commands::Merge(args)) => {
                assert!(args.batches && args.dry_run && args.skip_split);
                assert!(!args.apply_renames);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_build_config() {
        let cli = Cli::try_parse_from([
            "acdb",
            "backfill",
            "--root",
            "/srv/acdb",
            "--output-dir",
            "/srv/out",
            "--no-backup",
        ])
        .expect("parse");
        let config = config_from(&cli);
        assert_eq!(config.workspace_root, PathBuf::from("/srv/acdb"));
        assert_eq!(config.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.rules_dir, PathBuf::from("/srv/acdb/rules"));
        assert!(!config.backups);
    }
}
