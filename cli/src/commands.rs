use std::io;

use anyhow::{bail, Context, Result};
use jellytidy::{
    grouping, junk, planner, similarity, CatalogApi, CatalogSnapshot, MergeExecutor,
    PlanOptions, PlaylistGenerator, Services,
};
use shared::{
    catalog::EntryKind,
    discovery::{PlaylistRequest, PlaylistStyle, TimePeriod},
    duplicates::{DuplicateGroup, DuplicateReport},
    merge::{ExecutionReport, MergeMode, MergePlan},
};
use tracing::{info, warn};

use crate::prompt::{ask_decision, confirm, Decision};

pub async fn status(services: &Services) -> Result<()> {
    let summary = services
        .catalog()
        .summary()
        .await
        .context("reading catalog summary")?;
    let health = services.health().await;

    println!(
        "{} ({}) as user {}",
        services.catalog().name(),
        summary.server_name.as_deref().unwrap_or("unnamed server"),
        summary.user_id
    );
    println!("  artists: {}", summary.artists);
    println!("  tracks:  {}", summary.tracks);
    let discovery = services
        .list_discovery()
        .into_iter()
        .map(|(_, name)| name)
        .collect::<Vec<_>>();
    if discovery.is_empty() {
        println!("  discovery: not configured");
    } else {
        println!(
            "  discovery: {} ({})",
            discovery.join(", "),
            online(health.discovery_online)
        );
    }
    println!(
        "  remote shell: {}",
        if services.file_cleaner().is_ok() {
            online(health.remote_shell_ready)
        } else {
            "not configured"
        }
    );
    Ok(())
}

fn online(up: bool) -> &'static str {
    if up {
        "online"
    } else {
        "unreachable"
    }
}

async fn scan_report(
    services: &Services,
    kind: EntryKind,
    threshold: f64,
) -> Result<(CatalogSnapshot, DuplicateReport)> {
    let snapshot = CatalogSnapshot::fetch(services.catalog())
        .await
        .context("reading the catalog")?;
    let report = grouping::report(snapshot.entries(kind), kind, threshold)?;
    info!(
        "{} duplicate {} groups among {} entries",
        report.groups.len(),
        kind,
        report.entries_scanned
    );
    Ok((snapshot, report))
}

pub async fn scan(services: &Services, kind: EntryKind, threshold: f64, json: bool) -> Result<()> {
    let (_, report) = scan_report(services, kind, threshold).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (index, group) in report.groups.iter().enumerate() {
        print!("{}", render_group(index + 1, group));
    }
    println!(
        "{} groups, {} {} entries involved, {} flagged for review (threshold {:.2})",
        report.groups.len(),
        report.duplicate_entries(),
        report.kind,
        report.flagged().count(),
        report.threshold
    );
    Ok(())
}

pub fn render_group(number: usize, group: &DuplicateGroup) -> String {
    let mut out = format!(
        "Group {number}: keep '{}' (avg {:.0}%, min {:.0}%){}\n",
        group.suggested_name,
        group.average_score * 100.0,
        group.min_score * 100.0,
        if group.needs_review {
            " [needs review]"
        } else {
            ""
        }
    );
    for member in &group.members {
        let counts = match member.kind {
            EntryKind::Artist => format!("{} tracks, {} albums", member.track_count, member.album_count),
            EntryKind::Track => format!(
                "by {}, metadata {}",
                member.artist_name.as_deref().unwrap_or("?"),
                member.metadata_completeness
            ),
        };
        out.push_str(&format!("  [{}] {} ({counts})\n", member.id, member.name));
        if member.name != group.suggested_name {
            out.push_str(&format!(
                "      {}\n",
                similarity::explain(&member.name, &group.suggested_name)
            ));
        }
    }
    out
}

fn render_plan(plan: &MergePlan) -> String {
    let mut out = String::new();
    for op in &plan.operations {
        out.push_str(&format!("    {op}\n"));
    }
    out
}

fn render_report(report: &ExecutionReport) -> String {
    let mut out = String::new();
    for entry in &report.operations {
        out.push_str(&format!("    {} ... {}\n", entry.operation, entry.outcome));
    }
    if report.refreshed {
        out.push_str(&format!("    refreshed metadata of {}\n", report.canonical_id));
    }
    out
}

/// The decision `--yes` makes on its own; `None` means the operator is asked.
/// Groups flagged for review are never accepted without a prompt.
fn auto_decision(group: &DuplicateGroup, yes: bool) -> Option<Decision> {
    match (yes, group.needs_review) {
        (false, _) => None,
        (true, false) => Some(Decision::Accept(None)),
        (true, true) => Some(Decision::Skip),
    }
}

pub struct MergeArgs {
    pub kind: EntryKind,
    pub threshold: f64,
    pub rename_only: bool,
    pub yes: bool,
    pub dry_run: bool,
}

pub async fn merge(services: &Services, args: MergeArgs) -> Result<()> {
    let (snapshot, report) = scan_report(services, args.kind, args.threshold).await?;
    if report.groups.is_empty() {
        println!("No duplicate {} entries found", args.kind);
        return Ok(());
    }

    let rehearsal = args.dry_run.then(|| snapshot.to_memory());
    let catalog: &dyn CatalogApi = match &rehearsal {
        Some(memory) => {
            println!("Dry run: changes go to an in-memory copy of the catalog");
            memory
        }
        None => services.catalog(),
    };
    let executor = MergeExecutor::new(catalog).refresh_after(!args.dry_run);
    let mode = if args.rename_only {
        MergeMode::RenameOnly
    } else {
        MergeMode::Merge
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let (mut merged, mut skipped, mut failed) = (0, 0, 0);

    for (index, group) in report.groups.iter().enumerate() {
        print!("{}", render_group(index + 1, group));

        let decision = match auto_decision(group, args.yes) {
            Some(Decision::Skip) => {
                println!("  skipped: flagged for review, rerun without --yes to decide");
                Decision::Skip
            }
            Some(decision) => decision,
            None => ask_decision(&mut input, &mut output)?,
        };

        let preferred = match decision {
            Decision::Accept(preferred) => preferred,
            Decision::Skip => {
                skipped += 1;
                continue;
            }
            Decision::Quit => break,
        };

        let options = PlanOptions {
            mode,
            preferred,
        };
        let plan = match planner::plan(group, &snapshot.tracks, &options) {
            Ok(plan) => plan,
            Err(e) => {
                println!("  cannot plan this group: {e}");
                failed += 1;
                continue;
            }
        };
        if plan.is_empty() {
            println!("  nothing to do");
            continue;
        }
        print!("{}", render_plan(&plan));

        let result = executor.execute(&plan).await?;
        print!("{}", render_report(&result));
        if result.is_complete() {
            merged += 1;
        } else {
            failed += 1;
            let remaining = result.remaining_plan(&plan);
            warn!(
                "{} operations left for '{}'; rerun merge to retry them",
                remaining.operations.len(),
                plan.canonical_name
            );
            print!("  not applied:\n{}", render_plan(&remaining));
        }
    }

    println!("{merged} merged, {skipped} skipped, {failed} failed");
    if failed > 0 {
        bail!("{failed} groups were not fully merged");
    }
    Ok(())
}

pub async fn junk(services: &Services, delete: bool, yes: bool) -> Result<()> {
    let snapshot = CatalogSnapshot::fetch(services.catalog()).await?;
    let found = junk::junk_artists(&snapshot.artists);
    if found.is_empty() {
        println!("No junk artists found");
        return Ok(());
    }

    let (deletable, owning): (Vec<_>, Vec<_>) = found.into_iter().partition(|a| a.track_count == 0);
    for artist in &deletable {
        println!("  [{}] '{}'", artist.id, artist.name);
    }
    for artist in &owning {
        println!(
            "  [{}] '{}' owns {} tracks, merge it into a real artist instead",
            artist.id, artist.name, artist.track_count
        );
    }
    if !delete || deletable.is_empty() {
        return Ok(());
    }

    let question = format!("Delete {} junk artists?", deletable.len());
    if !yes && !confirm(&question, &mut io::stdin().lock(), &mut io::stdout())? {
        println!("Nothing deleted");
        return Ok(());
    }

    let plan = planner::deletion_plan(EntryKind::Artist, deletable.iter().copied())?;
    let report = MergeExecutor::new(services.catalog()).execute(&plan).await?;
    print!("{}", render_report(&report));
    if !report.is_complete() {
        bail!("{} junk artists were not deleted", report.unresolved().len());
    }
    Ok(())
}

pub struct PlaylistArgs {
    pub artists: String,
    pub style: PlaylistStyle,
    pub count: usize,
    pub from_year: Option<i32>,
    pub to_year: Option<i32>,
    pub save: bool,
}

pub async fn playlist(services: &Services, args: PlaylistArgs) -> Result<()> {
    let discovery = services.discovery(None)?;
    let generator = PlaylistGenerator::new(services.playlists(), discovery);
    let request = PlaylistRequest {
        artists: args.artists,
        style: args.style,
        track_count: args.count,
        period: TimePeriod::between(args.from_year, args.to_year),
    };

    let preview = generator.preview(&request).await?;
    println!("Playlist: {}", preview.name);
    for (index, track) in preview.tracks.iter().enumerate() {
        println!(
            "  {:>2}. {} - {} (popularity {})",
            index + 1,
            track.title,
            track.artist,
            track.popularity
        );
    }
    if !preview.unmatched.is_empty() {
        println!("  {} tracks not in the catalog", preview.unmatched.len());
    }

    if args.save {
        let id = generator.save(&preview).await?;
        println!("Created playlist '{}' (id: {id})", preview.name);
    } else {
        println!("Run again with --save to create it");
    }
    Ok(())
}

pub async fn list_playlist_files(services: &Services, music_path: &str) -> Result<()> {
    let cleaner = services.file_cleaner()?;
    let user = cleaner.whoami().await?;
    let files = cleaner.find_playlist_files(music_path).await?;
    println!("{} playlist files under {music_path} (remote user {user})", files.len());
    for path in &files {
        let writable = cleaner.can_write(path).await.unwrap_or(false);
        println!("  {}{path}", if writable { "" } else { "[read-only] " });
    }
    Ok(())
}

pub async fn delete_playlist_files(
    services: &Services,
    music_path: &str,
    paths: Vec<String>,
    refresh: bool,
    yes: bool,
) -> Result<()> {
    let cleaner = services.file_cleaner()?;
    let paths = if paths.is_empty() {
        cleaner.find_playlist_files(music_path).await?
    } else {
        paths
    };
    if paths.is_empty() {
        println!("No playlist files to delete");
        return Ok(());
    }
    for path in &paths {
        println!("  {path}");
    }

    let question = format!("Delete {} files on the server?", paths.len());
    if !yes && !confirm(&question, &mut io::stdin().lock(), &mut io::stdout())? {
        println!("Nothing deleted");
        return Ok(());
    }

    let results = cleaner.delete_files(&paths).await;
    let deleted = results.iter().filter(|r| r.is_success()).count();
    for failure in results.iter().filter(|r| !r.is_success()) {
        println!(
            "  failed {}: {}",
            failure.path,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!("Deleted {deleted} of {} files", results.len());

    if refresh && deleted > 0 {
        services.catalog().refresh_metadata(None).await?;
        println!("Library scan triggered");
    }
    if deleted < results.len() {
        bail!("{} files could not be deleted", results.len() - deleted);
    }
    Ok(())
}

pub async fn refresh(services: &Services, id: Option<&str>) -> Result<()> {
    services.catalog().refresh_metadata(id).await?;
    match id {
        Some(id) => println!("Metadata refresh of {id} triggered"),
        None => println!("Library scan triggered"),
    }
    Ok(())
}
