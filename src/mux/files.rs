//! Directory listing fan-out

use futures_util::future::join_all;

use super::MuxBackend;
use crate::search::{DirInfo, SearchError, SearchResult};

impl MuxBackend {
    /// List `path` on every child and merge the answers. Children that fail
    /// are skipped; children disagreeing on the path or catalog fail the call.
    pub(super) async fn list(&self, path: &str, hidden: bool) -> SearchResult<DirInfo> {
        if let [only] = self.backends.as_slice() {
            return only.files(path, hidden).await;
        }

        let answers = join_all(self.backends.iter().map(|b| async move {
            (b.to_string(), b.files(path, hidden).await)
        }))
        .await;

        let mut merged: Option<DirInfo> = None;
        let mut first_error = None;
        for (name, answer) in answers {
            let info = match answer {
                Ok(info) => info,
                Err(err) => {
                    tracing::warn!(backend = %name, path = %path, "failed to list directory: {}", err);
                    first_error.get_or_insert(err);
                    continue;
                }
            };

            match merged.as_mut() {
                None => merged = Some(info),
                Some(acc) => merge_into(acc, info)?,
            }
        }

        match (merged, first_error) {
            (Some(info), _) => Ok(info),
            (None, Some(err)) => Err(err),
            (None, None) => Ok(DirInfo::new(path)),
        }
    }
}

fn merge_into(acc: &mut DirInfo, info: DirInfo) -> SearchResult<()> {
    if acc.dir_path != info.dir_path {
        return Err(SearchError::InconsistentPath(acc.dir_path.clone(), info.dir_path));
    }

    let catalog = |c: &Option<String>| c.clone().filter(|s| !s.is_empty()).unwrap_or_default();
    if catalog(&acc.catalog) != catalog(&info.catalog) {
        return Err(SearchError::InconsistentCatalog(
            catalog(&acc.catalog),
            catalog(&info.catalog),
        ));
    }

    acc.files.extend(info.files);
    acc.dirs.extend(info.dirs);
    acc.catalogs.extend(info.catalogs);
    for (host, nodes) in info.details {
        acc.details.entry(host).or_default().extend(nodes);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::fake::FakeBackend;
    use crate::mux::MuxBackend;
    use crate::search::{Backend, SearchError};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_merge_listings() {
        let mux = MuxBackend::new(vec![
            Arc::new(FakeBackend::new(0, 0).host("a").listing(["1.txt", "2.txt"], ["logs"])),
            Arc::new(FakeBackend::new(0, 0).host("b").listing(["2.txt", "3.txt"], ["pcap"])),
        ]);
        let info = mux.files("foo", false).await.unwrap();

        assert_eq!(info.dir_path, "foo");
        assert_eq!(info.files.iter().collect::<Vec<_>>(), ["1.txt", "2.txt", "3.txt"]);
        assert_eq!(info.dirs.len(), 2);
        assert_eq!(info.details.len(), 2);
        assert!(info.details["b"].contains_key("3.txt"));
    }

    #[tokio::test]
    async fn test_failed_child_is_skipped() {
        let mux = MuxBackend::new(vec![
            Arc::new(FakeBackend::new(0, 0).listing(["1.txt"], Vec::<String>::new())),
            Arc::new(FakeBackend::new(0, 0).files_error("disk on fire")),
        ]);
        let info = mux.files("foo", false).await.unwrap();
        assert_eq!(info.files.len(), 1);

        let mux = MuxBackend::new(vec![
            Arc::new(FakeBackend::new(0, 0).files_error("first")),
            Arc::new(FakeBackend::new(0, 0).files_error("second")),
        ]);
        let err = mux.files("foo", false).await.unwrap_err();
        assert_eq!(err.to_string(), "first");
    }

    #[tokio::test]
    async fn test_inconsistent_path() {
        let mux = MuxBackend::new(vec![
            Arc::new(FakeBackend::new(0, 0)),
            Arc::new(FakeBackend::new(0, 0)),
            Arc::new(FakeBackend::new(0, 0).path_suffix("-1")),
        ]);
        let err = mux.files("foo", false).await.unwrap_err();
        assert!(matches!(err, SearchError::InconsistentPath(..)));
        assert!(err.to_string().contains("inconsistent"));
    }

    #[tokio::test]
    async fn test_inconsistent_catalog() {
        let mut with_catalog = FakeBackend::new(0, 0);
        with_catalog.catalog = Some("cat-1".into());
        let mux = MuxBackend::new(vec![Arc::new(FakeBackend::new(0, 0)), Arc::new(with_catalog)]);

        let err = mux.files("foo", false).await.unwrap_err();
        assert!(err.to_string().contains("inconsistent catalog"));
    }
}
