// Result resolver - maps a successful yt-dlp run to the file it produced
//
// Cascade, first match wins:
// 1. explicit "Destination:" / "Merging formats into" naming a file under the output dir
// 2. alternate phrasings ([download] lines, "already downloaded", "Not converting audio")
// 3. "100% of <name>" completion lines
// 4. directory scan, preferring files prefixed with the video id

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use regex::Regex;

use super::errors::DownloadError;
use super::models::{ExecutionResult, OutputKind, ResolutionSource, ResolvedArtifact};

lazy_static::lazy_static! {
    static ref ANSI_RE: Regex = Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap();
    static ref DESTINATION_RE: Regex =
        Regex::new(r"(?m)^(?:\[[^\]]+\]\s*)?Destination:\s+(.+?)\s*$").unwrap();
    static ref MERGE_RE: Regex =
        Regex::new(r#"(?m)^\[Merger\]\s+Merging formats into "(.+)"\s*$"#).unwrap();
    static ref DOWNLOAD_DEST_RE: Regex =
        Regex::new(r"(?m)^\[download\]\s+Destination:\s+(.+?)\s*$").unwrap();
    static ref ALREADY_RE: Regex =
        Regex::new(r"(?m)^\[download\]\s+(.+?)\s+has already been downloaded").unwrap();
    static ref NOT_CONVERTING_RE: Regex =
        Regex::new(r"(?m)^\[ExtractAudio\]\s+Not converting audio\s+(.+?);").unwrap();
    static ref COMPLETION_RE: Regex =
        Regex::new(r"(?m)100(?:\.0+)?%\s+of\s+~?\s*(.+?)\s*$").unwrap();
}

type TextMatcher = fn(&str, &Path, OutputKind) -> Option<PathBuf>;

const TEXT_MATCHERS: [(ResolutionSource, TextMatcher); 3] = [
    (ResolutionSource::DestinationLine, match_destination_line),
    (ResolutionSource::AlternateDestination, match_alternate_destination),
    (ResolutionSource::CompletionLine, match_completion_line),
];

/// Remove terminal color/cursor escape sequences
pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").to_string()
}

/// Identify the file a successful run produced.
pub fn resolve(
    result: &ExecutionResult,
    output_dir: &Path,
    disambiguating_id: &str,
    kind: OutputKind,
) -> Result<ResolvedArtifact, DownloadError> {
    let text = strip_ansi(&result.combined_output());

    let text_match = TEXT_MATCHERS
        .iter()
        .find_map(|(source, matcher)| matcher(&text, output_dir, kind).map(|p| (p, *source)));

    let (path, source) = match text_match {
        Some(found) => found,
        None => match scan_directory(output_dir, disambiguating_id, kind)? {
            Some(path) => (path, ResolutionSource::DirectoryScan),
            None => {
                return Err(DownloadError::ArtifactNotFound {
                    dir: output_dir.to_path_buf(),
                    detail: format!("no .{} file in output or directory", kind.extension()),
                })
            }
        },
    };

    if !path.is_file() {
        return Err(DownloadError::ArtifactNotFound {
            dir: output_dir.to_path_buf(),
            detail: format!("{} does not exist", path.display()),
        });
    }

    tracing::debug!("[Resolver] {:?} -> {}", source, path.display());

    Ok(ResolvedArtifact {
        extension: kind.extension().to_string(),
        path,
        source,
    })
}

/// Last explicit destination naming an accepted file under `output_dir`.
fn match_destination_line(text: &str, output_dir: &Path, kind: OutputKind) -> Option<PathBuf> {
    let destinations = DESTINATION_RE.captures_iter(text);
    let merges = MERGE_RE.captures_iter(text);

    let mut found: Vec<(usize, PathBuf)> = destinations
        .chain(merges)
        .filter_map(|caps| {
            let m = caps.get(1)?;
            Some((m.start(), PathBuf::from(m.as_str())))
        })
        .filter(|(_, path)| kind.accepts(path) && is_under(path, output_dir))
        .collect();

    found.sort_by_key(|(pos, _)| *pos);
    found.pop().map(|(_, path)| path)
}

/// Destination-style lines reported relative to some other directory.
fn match_alternate_destination(text: &str, output_dir: &Path, kind: OutputKind) -> Option<PathBuf> {
    let mut found: Vec<(usize, String)> = [&*DOWNLOAD_DEST_RE, &*ALREADY_RE, &*NOT_CONVERTING_RE]
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| {
            let m = caps.get(1)?;
            Some((m.start(), m.as_str().trim_matches('"').to_string()))
        })
        .collect();

    found.sort_by_key(|(pos, _)| *pos);
    found
        .into_iter()
        .rev()
        .filter_map(|(_, raw)| join_file_name(&raw, output_dir))
        .find(|path| kind.accepts(path))
}

fn match_completion_line(text: &str, output_dir: &Path, kind: OutputKind) -> Option<PathBuf> {
    COMPLETION_RE
        .captures_iter(text)
        .filter_map(|caps| join_file_name(caps.get(1)?.as_str(), output_dir))
        .filter(|path| kind.accepts(path))
        .last()
}

fn join_file_name(raw: &str, output_dir: &Path) -> Option<PathBuf> {
    // yt-dlp prints native separators; accept both
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() {
        return None;
    }
    Some(output_dir.join(name))
}

fn is_under(path: &Path, output_dir: &Path) -> bool {
    if path.starts_with(output_dir) {
        return true;
    }
    match (fs::canonicalize(output_dir), path.parent().map(fs::canonicalize)) {
        (Ok(dir), Some(Ok(parent))) => parent.starts_with(dir),
        _ => false,
    }
}

/// Newest accepted file, preferring ones named after `disambiguating_id`.
///
/// Falling back to any accepted file can pick up a concurrent download of a
/// different video; that imprecision is accepted.
pub fn scan_directory(
    output_dir: &Path,
    disambiguating_id: &str,
    kind: OutputKind,
) -> Result<Option<PathBuf>, DownloadError> {
    let entries = match fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DownloadError::Io(e)),
    };

    let mut tagged: Option<(SystemTime, PathBuf)> = None;
    let mut untagged: Option<(SystemTime, PathBuf)> = None;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !kind.accepts(&path) {
            continue;
        }

        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let is_tagged = path
            .file_stem()
            .map_or(false, |s| carries_id(&s.to_string_lossy(), disambiguating_id));

        let slot = if is_tagged { &mut tagged } else { &mut untagged };
        if slot.as_ref().map_or(true, |(best, _)| modified > *best) {
            *slot = Some((modified, path));
        }
    }

    Ok(tagged.or(untagged).map(|(_, path)| path))
}

/// True when a file stem was written for `id` by the `<id>-<title>` template.
fn carries_id(stem: &str, id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    if stem == id {
        return true;
    }
    if !stem.strip_prefix(id).map_or(false, |rest| rest.starts_with('-')) {
        return false;
    }
    // A shorter id can also be the start of another video's full-length id
    if id.len() < YOUTUBE_ID_LEN {
        if let Some((other, sep)) = stem.get(..=YOUTUBE_ID_LEN).map(|h| h.split_at(YOUTUBE_ID_LEN)) {
            if sep == "-" && other.bytes().all(is_id_byte) {
                return false;
            }
        }
    }
    true
}

const YOUTUBE_ID_LEN: usize = 11;

fn is_id_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;

    fn ok(stdout: &str) -> ExecutionResult {
        ExecutionResult {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn touch(path: &Path, age_secs: u64) {
        let file = File::create(path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
            .unwrap();
    }

    #[test]
    fn destination_line_wins_over_newer_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("42-song.mp3");
        touch(&target, 60);
        touch(&dir.path().join("42-newer.mp3"), 0);

        let output = format!("[ExtractAudio] Destination: {}\n", target.display());
        let artifact = resolve(&ok(&output), dir.path(), "42", OutputKind::Audio).unwrap();

        assert_eq!(artifact.path, target);
        assert_eq!(artifact.source, ResolutionSource::DestinationLine);
        assert_eq!(artifact.extension, "mp3");
    }

    #[test]
    fn last_accepted_destination_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let webm = dir.path().join("42-song.webm");
        let mp3 = dir.path().join("42-song.mp3");
        touch(&webm, 0);
        touch(&mp3, 0);

        let output = format!(
            "[youtube] 42: Downloading webpage\n\
             [download] Destination: {}\n\
             [download] 100% of 3.20MiB in 00:00:01\n\
             [ExtractAudio] Destination: {}\n\
             Deleting original file {} (pass -k to keep)\n",
            webm.display(),
            mp3.display(),
            webm.display()
        );
        let artifact = resolve(&ok(&output), dir.path(), "42", OutputKind::Audio).unwrap();
        assert_eq!(artifact.path, mp3);
    }

    #[test]
    fn merger_line_is_a_destination() {
        let dir = tempfile::tempdir().unwrap();
        let mp4 = dir.path().join("7-clip.mp4");
        touch(&mp4, 0);

        let output = format!("[Merger] Merging formats into \"{}\"\n", mp4.display());
        let artifact = resolve(&ok(&output), dir.path(), "7", OutputKind::Video).unwrap();
        assert_eq!(artifact.path, mp4);
        assert_eq!(artifact.source, ResolutionSource::DestinationLine);
    }

    #[test]
    fn ansi_sequences_are_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("42-song.mp3");
        touch(&target, 0);

        let output = format!(
            "\x1b[0;94m[ExtractAudio]\x1b[0m Destination: {}\x1b[0m\n",
            target.display()
        );
        let artifact = resolve(&ok(&output), dir.path(), "42", OutputKind::Audio).unwrap();
        assert_eq!(artifact.path, target);
        assert_eq!(strip_ansi("\x1b[1;31mERROR:\x1b[0m x"), "ERROR: x");
    }

    #[test]
    fn alternate_phrasing_joins_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("42-song.mp3");
        touch(&target, 0);

        let output = "[download] elsewhere/42-song.mp3 has already been downloaded\n";
        let artifact = resolve(&ok(output), dir.path(), "42", OutputKind::Audio).unwrap();
        assert_eq!(artifact.path, target);
        assert_eq!(artifact.source, ResolutionSource::AlternateDestination);
    }

    #[test]
    fn completion_phrasing_joins_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("42-song.mp3");
        touch(&target, 0);

        let output = "[download] 100% of 42-song.mp3\n";
        let artifact = resolve(&ok(output), dir.path(), "42", OutputKind::Audio).unwrap();
        assert_eq!(artifact.path, target);
        assert_eq!(artifact.source, ResolutionSource::CompletionLine);
    }

    #[test]
    fn scan_prefers_identifier_over_newer_file() {
        let dir = tempfile::tempdir().unwrap();
        let ours = dir.path().join("42-song.mp3");
        touch(&ours, 120);
        touch(&dir.path().join("99-other.mp3"), 0);

        let artifact = resolve(&ok("nothing useful"), dir.path(), "42", OutputKind::Audio).unwrap();
        assert_eq!(artifact.path, ours);
        assert_eq!(artifact.source, ResolutionSource::DirectoryScan);
    }

    #[test]
    fn scan_picks_newest_tagged_file() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("42-old.mp3"), 300);
        let newest = dir.path().join("42-new.mp3");
        touch(&newest, 10);
        touch(&dir.path().join("42-video.mp4"), 0);

        let found = scan_directory(dir.path(), "42", OutputKind::Audio).unwrap();
        assert_eq!(found, Some(newest));
    }

    #[test]
    fn scan_falls_back_to_newest_untagged() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.mp3"), 300);
        let newest = dir.path().join("b.mp3");
        touch(&newest, 0);

        let found = scan_directory(dir.path(), "42", OutputKind::Audio).unwrap();
        assert_eq!(found, Some(newest));
    }

    #[test]
    fn scan_ignores_full_length_ids_sharing_a_short_prefix() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("ab-Mine.mp3"), 600);
        touch(&dir.path().join("ab-cd-Other-Song.mp3"), 0);

        let found = scan_directory(dir.path(), "ab", OutputKind::Audio).unwrap();
        assert_eq!(found, Some(dir.path().join("ab-Mine.mp3")));

        assert!(carries_id("ab-cd-Other", "ab"));
        assert!(carries_id("dQw4w9WgXcQ-Song-Title", "dQw4w9WgXcQ"));
        assert!(!carries_id("abc-Song", "ab"));
        assert!(!carries_id("anything", ""));
    }

    #[test]
    fn missing_candidate_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("42-fallback.mp3"), 0);
        let output = format!("Destination: {}\n", dir.path().join("42-gone.mp3").display());

        match resolve(&ok(&output), dir.path(), "42", OutputKind::Audio) {
            Err(DownloadError::ArtifactNotFound { .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn empty_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("42-song.mp4"), 0);

        match resolve(&ok(""), dir.path(), "42", OutputKind::Audio) {
            Err(DownloadError::ArtifactNotFound { .. }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
