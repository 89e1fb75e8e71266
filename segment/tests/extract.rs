use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use countertool_config::CorpusConfig;
use countertool_segment::CursorStore;
use countertool_segment::DemarcationToken;
use countertool_segment::LogCorpus;
use countertool_segment::Locator;
use countertool_segment::NativeCorpusAccess;
use countertool_segment::SegmentError;
use countertool_segment::SegmentExtractor;
use countertool_segment::SegmentOutcome;
use flate2::Compression;
use flate2::write::GzEncoder;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    fn new() -> Result<Self> {
        let tmp = TempDir::new()?;
        fs::create_dir_all(tmp.path().join("data_files"))?;
        fs::create_dir_all(tmp.path().join("archived_files"))?;
        Ok(Self { tmp })
    }

    fn root(&self) -> &Path {
        self.tmp.path()
    }

    fn cursor_path(&self) -> PathBuf {
        self.root().join("demarcation_metadata_file")
    }

    fn marker_path(&self) -> PathBuf {
        self.root().join(".first_occurance_instance_one")
    }

    fn scratch(&self) -> PathBuf {
        self.root().join("scratch")
    }

    fn set_cursor(&self, raw: &str) -> Result<()> {
        fs::write(self.cursor_path(), format!("{raw}\n"))?;
        Ok(())
    }

    fn cursor(&self) -> Result<String> {
        Ok(fs::read_to_string(self.cursor_path())?.trim().to_string())
    }

    fn live(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.root().join("data_files").join(name);
        fs::write(&path, contents)?;
        Ok(path)
    }

    fn archive(&self, name: &str, member: &str, contents: &str) -> Result<PathBuf> {
        let path = self.root().join("archived_files").join(name);
        let encoder = GzEncoder::new(fs::File::create(&path)?, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, member, contents.as_bytes())?;
        builder.into_inner()?.finish()?;
        Ok(path)
    }

    fn extractor(&self) -> SegmentExtractor<NativeCorpusAccess> {
        let corpus = LogCorpus::new(CorpusConfig {
            data_dir: self.root().join("data_files"),
            archive_dir: self.root().join("archived_files"),
            log_prefix: "iqtrace".to_string(),
            scratch_dir: self.scratch(),
        });
        SegmentExtractor::new(
            Locator::new(corpus, NativeCorpusAccess),
            CursorStore::new(self.cursor_path()),
            self.marker_path(),
        )
    }

    fn run(&self) -> (Result<SegmentOutcome, SegmentError>, String) {
        let mut out = Vec::new();
        let outcome = self.extractor().extract_next(&mut out);
        (outcome, String::from_utf8_lossy(&out).into_owned())
    }

    fn mark_first_instance_done(&self) -> Result<()> {
        fs::write(self.marker_path(), "")?;
        Ok(())
    }
}

fn expect_extracted(outcome: Result<SegmentOutcome, SegmentError>) -> countertool_segment::Segment {
    match outcome {
        Ok(SegmentOutcome::Extracted(segment)) => segment,
        other => panic!("expected an extracted segment, got {other:?}"),
    }
}

#[test]
fn single_file_window_advances_cursor() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_3")?;
    let live = fx.live(
        "iqtrace.log",
        "before\n\
         insert into marker values('run1_demarcation_3')\n\
         select a from dc_e_x_raw\n\
         insert into marker values('run1_demarcation_4')\n\
         after\n",
    )?;

    let (outcome, text) = fx.run();
    let segment = expect_extracted(outcome);

    assert_eq!(
        text,
        "insert into marker values('run1_demarcation_3')\n\
         select a from dc_e_x_raw\n\
         insert into marker values('run1_demarcation_4')\n"
    );
    assert_eq!(segment.start_token, Some(DemarcationToken::new("run1", 3)));
    assert_eq!(segment.end_token, DemarcationToken::new("run1", 4));
    assert_eq!(segment.source_files, vec![live.clone()]);
    assert_eq!(segment.byte_ranges.len(), 1);
    assert_eq!(segment.byte_ranges[0].start, "before\n".len() as u64);
    assert_eq!(segment.len(), text.len() as u64);
    assert_eq!(fx.cursor()?, "run1_demarcation_4");
    assert_eq!(
        fs::read_to_string(fx.root().join("demarcation_metadata_file_copy"))?.trim(),
        "run1_demarcation_3"
    );
    Ok(())
}

#[test]
fn similar_instance_numbers_do_not_match() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_1")?;
    fx.mark_first_instance_done()?;
    fx.live(
        "iqtrace.log",
        "'run1_demarcation_1'\nq1\n'run1_demarcation_12'\nq2\n'run1_demarcation_2'\n",
    )?;

    let (outcome, text) = fx.run();
    expect_extracted(outcome);
    assert_eq!(
        text,
        "'run1_demarcation_1'\nq1\n'run1_demarcation_12'\nq2\n'run1_demarcation_2'\n"
    );
    Ok(())
}

#[test]
fn rerun_with_same_cursor_is_byte_identical() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_3")?;
    fx.live(
        "iqtrace.log",
        "x\n'run1_demarcation_3'\ny\n'run1_demarcation_4'\nz\n",
    )?;

    let (first, first_text) = fx.run();
    expect_extracted(first);
    fx.set_cursor("run1_demarcation_3")?;
    let (second, second_text) = fx.run();
    expect_extracted(second);

    assert_eq!(first_text, second_text);
    Ok(())
}

#[test]
fn window_spanning_rotated_and_active_files() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_5")?;
    let old = fx.live("iqtrace.log.old", "a\n'run1_demarcation_5'\nb\n")?;
    let active = fx.live("iqtrace.log", "c\n'run1_demarcation_6'\nd\n")?;

    let (outcome, text) = fx.run();
    let segment = expect_extracted(outcome);

    assert_eq!(text, "'run1_demarcation_5'\nb\nc\n'run1_demarcation_6'\n");
    assert_eq!(segment.source_files, vec![old, active]);
    assert_eq!(fx.cursor()?, "run1_demarcation_6");
    Ok(())
}

#[test]
fn start_marker_in_archive_is_unpacked_and_joined_with_live_files() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_8")?;
    fx.archive(
        "iqtrace_01-10-2026_000000.tar.gz",
        "iqtrace.log",
        "old\n'run1_demarcation_7'\n",
    )?;
    fx.archive(
        "iqtrace_02-10-2026_000000.tar.gz",
        "iqtrace.log",
        "p\n'run1_demarcation_8'\nq\n",
    )?;
    fx.archive(
        "iqtrace_03-10-2026_000000.tar.gz",
        "iqtrace.log",
        "r\n",
    )?;
    fx.live("iqtrace.log", "s\n'run1_demarcation_9'\nt\n")?;

    let (outcome, text) = fx.run();
    let segment = expect_extracted(outcome);

    assert_eq!(text, "'run1_demarcation_8'\nq\nr\ns\n'run1_demarcation_9'\n");
    assert_eq!(segment.source_files.len(), 3);
    assert!(!fx.scratch().exists(), "scratch workspace is cleaned up");
    assert_eq!(fx.cursor()?, "run1_demarcation_9");
    Ok(())
}

#[test]
fn earliest_matching_archive_wins() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_2")?;
    fx.mark_first_instance_done()?;
    // Listing order would pick the later archive first.
    fx.archive(
        "iqtrace_b_05-10-2026_000000.tar.gz",
        "iqtrace.log",
        "late\n'run1_demarcation_2'\nlate-tail\n",
    )?;
    fx.archive(
        "iqtrace_a_04-10-2026_000000.tar.gz",
        "iqtrace.log",
        "early\n'run1_demarcation_2'\nearly-tail\n",
    )?;
    fx.live("iqtrace.log", "'run1_demarcation_3'\n")?;

    let (outcome, text) = fx.run();
    expect_extracted(outcome);
    assert!(text.starts_with("'run1_demarcation_2'\nearly-tail\n"), "{text}");
    Ok(())
}

#[test]
fn unreadable_archive_is_skipped() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_4")?;
    fs::write(
        fx.root()
            .join("archived_files")
            .join("iqtrace_01-10-2026_000000.tar.gz"),
        "not a gzip stream",
    )?;
    fx.archive(
        "iqtrace_02-10-2026_000000.tar.gz",
        "iqtrace.log",
        "'run1_demarcation_4'\nbody\n'run1_demarcation_5'\n",
    )?;

    let (outcome, text) = fx.run();
    expect_extracted(outcome);
    assert_eq!(text, "'run1_demarcation_4'\nbody\n'run1_demarcation_5'\n");
    Ok(())
}

#[test]
fn missing_end_marker_restores_cursor() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_3")?;
    fx.live("iqtrace.log", "'run1_demarcation_3'\nstill running\n")?;

    let (outcome, _) = fx.run();
    assert!(
        matches!(outcome, Err(SegmentError::MarkerNotFound(ref t)) if t.instance() == 4),
        "{outcome:?}"
    );
    assert_eq!(fx.cursor()?, "run1_demarcation_3");
    Ok(())
}

#[test]
fn missing_start_marker_falls_back_to_backup_cursor() -> Result<()> {
    let fx = Fixture::new()?;
    // The cursor names a run that never reached the logs.
    fx.set_cursor("run2_demarcation_3")?;
    fs::write(
        fx.root().join("demarcation_metadata_file_copy"),
        "run1_demarcation_4\n",
    )?;
    fx.live("iqtrace.log", "'run1_demarcation_4'\nq\n'run1_demarcation_5'\n")?;

    let (outcome, text) = fx.run();
    let segment = expect_extracted(outcome);
    assert_eq!(segment.start_token, Some(DemarcationToken::new("run1", 4)));
    assert_eq!(text, "'run1_demarcation_4'\nq\n'run1_demarcation_5'\n");
    assert_eq!(fx.cursor()?, "run1_demarcation_5");
    Ok(())
}

#[test]
fn marker_absent_everywhere_is_fatal() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_7")?;
    fx.live("iqtrace.log", "nothing to see\n")?;

    let (outcome, text) = fx.run();
    assert!(
        matches!(outcome, Err(SegmentError::MarkerNotFound(ref t)) if t.instance() == 7),
        "{outcome:?}"
    );
    assert_eq!(text, "");
    Ok(())
}

#[test]
fn first_instance_emits_head_segment_once() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_1")?;
    fx.live(
        "iqtrace.log",
        "boot\nselect 1\n'run1_demarcation_1'\nq\n'run1_demarcation_2'\n",
    )?;

    let (outcome, text) = fx.run();
    assert!(
        matches!(outcome, Ok(SegmentOutcome::HeadSegment(ref s)) if s.start_token.is_none()),
        "{outcome:?}"
    );
    assert_eq!(text, "boot\nselect 1\n'run1_demarcation_1'\n");
    assert!(fx.marker_path().exists());
    assert_eq!(fx.cursor()?, "run1_demarcation_1");

    let (outcome, text) = fx.run();
    expect_extracted(outcome);
    assert_eq!(text, "'run1_demarcation_1'\nq\n'run1_demarcation_2'\n");
    assert_eq!(fx.cursor()?, "run1_demarcation_2");
    Ok(())
}

#[test]
fn first_instance_without_marker_waits() -> Result<()> {
    let fx = Fixture::new()?;
    fx.set_cursor("run1_demarcation_1")?;
    fx.mark_first_instance_done()?;
    fx.live("iqtrace.log", "no markers yet\n")?;

    let (outcome, _) = fx.run();
    assert!(
        matches!(outcome, Ok(SegmentOutcome::AwaitingFirstMarker(_))),
        "{outcome:?}"
    );
    assert_eq!(fx.cursor()?, "run1_demarcation_1");
    Ok(())
}
