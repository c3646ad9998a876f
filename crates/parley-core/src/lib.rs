//! Clock and durable-write helpers shared by the tracker store and the
//! conversation sweeps.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp_f64, elapsed_at_least};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_current_unix_timestamp_is_after_2023() {
        assert!(current_unix_timestamp_f64() > 1_700_000_000.0);
    }

    #[test]
    fn unit_elapsed_at_least_is_inclusive_at_boundary() {
        let now = 1_700_000_000.0;
        assert!(elapsed_at_least(now, now - 86_400.0, 86_400.0));
        assert!(!elapsed_at_least(now, now - 86_399.0, 86_400.0));
        assert!(elapsed_at_least(now, now - 90_000.0, 86_400.0));
    }

    #[tokio::test]
    async fn functional_write_text_atomic_replaces_content_and_leaves_no_staging_files() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested").join("record.json");
        write_text_atomic(&path, "first").await.expect("first write");
        write_text_atomic(&path, "second").await.expect("second write");
        assert_eq!(tokio::fs::read_to_string(&path).await.expect("read"), "second");
        let siblings = std::fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .count();
        assert_eq!(siblings, 1);
    }

    #[tokio::test]
    async fn regression_write_text_atomic_rejects_directory_destination() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "x")
            .await
            .expect_err("directory should fail");
        assert!(error.to_string().contains("is a directory"));
    }
}
