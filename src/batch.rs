//! Per-item processing and the grouped batch pipeline.
//!
//! Each `process` call owns its item from the moment it marks it `Running`
//! until it commits the outcome. The store lock is only held to read a
//! snapshot and to commit, never across the service call or compositing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::compositing;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::item::{ExportedImage, ImageItem, IngestFile, ItemId, ItemStatus};
use crate::region::Region;
use crate::service::{CleanupRequest, CleanupService};
use crate::store::ImageStore;

/// Summary of one [`BatchProcessor::process_all`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Items selected for this run.
    pub submitted: usize,
    /// Sequential rounds executed.
    pub rounds: usize,
    /// Items that finished `Done`.
    pub done: usize,
    /// Items that finished `Failed`.
    pub failed: usize,
    /// Items not processed (removed or already running).
    pub skipped: usize,
}

/// What a `process` call needs, copied out of the store.
struct Job {
    source: Arc<[u8]>,
    mime_type: String,
    cleaned: Option<Arc<[u8]>>,
    region: Region,
}

/// Drives items through the cleanup service and the compositor.
pub struct BatchProcessor<S> {
    service: S,
    store: Mutex<ImageStore>,
    default_region: Mutex<Region>,
    group_size: usize,
}

impl<S: CleanupService> BatchProcessor<S> {
    /// Create a processor with default settings.
    #[must_use]
    pub fn new(service: S) -> Self {
        Self {
            service,
            store: Mutex::new(ImageStore::new()),
            default_region: Mutex::new(Region::default()),
            group_size: crate::config::DEFAULT_GROUP_SIZE,
        }
    }

    /// Create a processor from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the configuration is invalid.
    pub fn with_config(service: S, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            service,
            store: Mutex::new(ImageStore::new()),
            default_region: Mutex::new(config.default_region.clamp()),
            group_size: config.batch.group_size,
        })
    }

    /// The cleanup backend.
    #[must_use]
    pub fn service(&self) -> &S {
        &self.service
    }

    /// Number of items processed concurrently per round.
    #[must_use]
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// The zone copied into newly ingested items.
    pub async fn default_region(&self) -> Region {
        *self.default_region.lock().await
    }

    /// Change the zone for future ingestions. Existing items keep theirs.
    pub async fn set_default_region(&self, region: Region) {
        *self.default_region.lock().await = region.clamp();
    }

    /// Add images to the working set, each with a copy of the default zone.
    ///
    /// All files are validated first; if any is unsupported, none is added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for a non JPEG/PNG/WebP file.
    pub async fn ingest(&self, files: Vec<IngestFile>) -> Result<Vec<ItemId>> {
        for file in &files {
            file.validate()?;
        }
        let region = self.default_region().await;
        let mut store = self.store.lock().await;
        let ids: Vec<ItemId> = files
            .into_iter()
            .map(|file| store.insert(ImageItem::new(file, region)))
            .collect();
        info!(count = ids.len(), total = store.len(), "ingested images");
        Ok(ids)
    }

    /// Remove an item and release its payloads.
    ///
    /// An in-flight `process` call for it finishes and discards its result.
    pub async fn remove(&self, id: ItemId) -> Option<ImageItem> {
        let removed = self.store.lock().await.remove(id);
        if removed.is_some() {
            debug!(%id, "removed image");
        }
        removed
    }

    /// Snapshot of one item.
    pub async fn item(&self, id: ItemId) -> Option<ImageItem> {
        self.store.lock().await.get(id).cloned()
    }

    /// Snapshot of all items in insertion order.
    pub async fn items(&self) -> Vec<ImageItem> {
        self.store.lock().await.iter().cloned().collect()
    }

    /// Process one item, optionally committing a new zone first.
    ///
    /// Reuses cached cleaned output when present, so zone edits only
    /// recomposite. Failures are recorded on the item, not returned.
    ///
    /// # Errors
    ///
    /// Only precondition violations are returned, and they leave the item
    /// untouched: [`Error::UnknownItem`] and [`Error::AlreadyRunning`].
    /// `UnknownItem` is also returned when the item is removed while the call
    /// is in flight; its result is discarded.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn process(&self, id: ItemId, new_region: Option<Region>) -> Result<ItemStatus> {
        let job = self.start(id, new_region).await?;
        let region = job.region;
        let start = Instant::now();
        debug!(?region, cached = job.cleaned.is_some(), "processing image");

        let outcome = self.run(job).await;

        let mut store = self.store.lock().await;
        let Some(item) = store.get_mut(id) else {
            warn!("image removed while processing; discarding result");
            return Err(Error::UnknownItem(id));
        };

        match outcome {
            Ok((cleaned, final_image)) => {
                item.cleaned = Some(cleaned);
                item.final_image = Some(final_image.into());
                item.region = region;
                item.status = ItemStatus::Done;
                item.error_message = None;
                info!(elapsed_ms = start.elapsed().as_millis(), "image done");
            }
            Err(e) => {
                warn!(error = %e, "image failed");
                item.status = ItemStatus::Failed;
                item.error_message = Some(e.to_string());
            }
        }
        Ok(item.status)
    }

    /// Mark the item running and copy out what the job needs.
    async fn start(&self, id: ItemId, new_region: Option<Region>) -> Result<Job> {
        let mut store = self.store.lock().await;
        let item = store.get_mut(id).ok_or(Error::UnknownItem(id))?;
        if item.status == ItemStatus::Running {
            return Err(Error::AlreadyRunning(id));
        }
        if let Some(region) = new_region {
            item.region = region.clamp();
        }
        item.status = ItemStatus::Running;
        item.error_message = None;

        Ok(Job {
            source: item.source(),
            mime_type: item.mime_type().to_string(),
            cleaned: item.cleaned.clone(),
            region: item.region,
        })
    }

    /// Clean (unless cached) and composite. Nothing is committed here.
    async fn run(&self, job: Job) -> Result<(Arc<[u8]>, Vec<u8>)> {
        let cleaned = match job.cleaned {
            Some(cached) => {
                debug!("reusing cached cleaned image");
                cached
            }
            None => {
                let response = self
                    .service
                    .clean(CleanupRequest {
                        image_bytes: job.source.to_vec(),
                        mime_type: job.mime_type,
                    })
                    .await?;
                debug!(
                    bytes = response.image_bytes.len(),
                    mime_type = %response.mime_type,
                    "received cleaned image"
                );
                Arc::from(response.image_bytes)
            }
        };

        let final_image =
            compositing::composite_async(job.source, Arc::clone(&cleaned), job.region).await?;
        Ok((cleaned, final_image))
    }

    /// Process every `Pending` or `Failed` item in rounds of `group_size`.
    ///
    /// Rounds run one after another; items inside a round run concurrently and
    /// the next round starts only after every member has settled.
    #[instrument(skip(self))]
    pub async fn process_all(&self) -> BatchReport {
        let ids = self
            .store
            .lock()
            .await
            .ids_where(ItemStatus::is_submittable);

        let mut report = BatchReport {
            submitted: ids.len(),
            ..BatchReport::default()
        };
        if ids.is_empty() {
            debug!("nothing to process");
            return report;
        }

        let total_rounds = ids.len().div_ceil(self.group_size);
        info!(
            items = ids.len(),
            group_size = self.group_size,
            rounds = total_rounds,
            "starting batch"
        );
        let start = Instant::now();

        for (round, group) in ids.chunks(self.group_size).enumerate() {
            debug!(round = round + 1, size = group.len(), "starting round");
            let results = join_all(group.iter().map(|&id| self.process(id, None))).await;
            report.rounds += 1;

            for (id, result) in group.iter().zip(results) {
                match result {
                    Ok(ItemStatus::Done) => report.done += 1,
                    Ok(_) => report.failed += 1,
                    Err(e) => {
                        debug!(%id, error = %e, "skipped");
                        report.skipped += 1;
                    }
                }
            }
        }

        info!(
            done = report.done,
            failed = report.failed,
            skipped = report.skipped,
            elapsed_ms = start.elapsed().as_millis(),
            "batch finished"
        );
        report
    }

    /// The final artifact of a `Done` item.
    pub async fn export(&self, id: ItemId) -> Option<ExportedImage> {
        let store = self.store.lock().await;
        store.get(id).and_then(exported)
    }

    /// Final artifacts of every `Done` item, in insertion order.
    ///
    /// Names are unique within the result: a later item whose name is taken
    /// gets a `-2`, `-3`, ... suffix, so `a.jpg` and `a.png` do not overwrite
    /// each other when saved to one directory.
    pub async fn export_all(&self) -> Vec<ExportedImage> {
        let store = self.store.lock().await;
        let mut taken = HashSet::new();
        store
            .iter()
            .filter_map(exported)
            .map(|mut export| {
                export.file_name = unique_name(&mut taken, export.file_name);
                export
            })
            .collect()
    }
}

fn unique_name(taken: &mut HashSet<String>, name: String) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let stem = name.strip_suffix(".png").unwrap_or(&name);
    let mut n = 2;
    loop {
        let candidate = format!("{stem}-{n}.png");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn exported(item: &ImageItem) -> Option<ExportedImage> {
    if item.status() != ItemStatus::Done {
        return None;
    }
    item.final_image.as_ref().map(|bytes| ExportedImage {
        id: item.id(),
        file_name: item.export_name(),
        bytes: Arc::clone(bytes),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use image::{DynamicImage, Rgba, RgbaImage};
    use tokio::sync::Notify;

    use super::*;
    use crate::service::CleanupResponse;

    fn png(w: u32, h: u32, color: [u8; 4]) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(color)));
        compositing::encode_png(&img).unwrap()
    }

    /// Returns a blue image at half the input's resolution.
    #[derive(Default)]
    struct HalfSizeBlue {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CleanupService for HalfSizeBlue {
        async fn clean(&self, request: CleanupRequest) -> Result<CleanupResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let src = image::load_from_memory(&request.image_bytes)
                .map_err(|e| Error::Service(e.to_string()))?;
            Ok(CleanupResponse {
                image_bytes: png(src.width() / 2, src.height() / 2, [0, 0, 255, 255]),
                mime_type: "image/png".to_string(),
            })
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl CleanupService for AlwaysFails {
        async fn clean(&self, _request: CleanupRequest) -> Result<CleanupResponse> {
            Err(Error::Service("no image data found in response".to_string()))
        }
    }

    fn red_file(name: &str) -> IngestFile {
        IngestFile::new(name, "image/png", png(40, 40, [255, 0, 0, 255]))
    }

    #[tokio::test]
    async fn process_composites_and_caches_cleaned_output() {
        let processor = BatchProcessor::new(HalfSizeBlue::default());
        let ids = processor.ingest(vec![red_file("a.png")]).await.unwrap();

        let status = processor.process(ids[0], None).await.unwrap();
        assert_eq!(status, ItemStatus::Done);

        let item = processor.item(ids[0]).await.unwrap();
        assert!(item.cleaned_bytes().is_some());
        let out = image::load_from_memory(item.final_bytes().unwrap()).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (40, 40));
        // Default zone is the bottom-right 20% x 15%.
        assert_eq!(out.get_pixel(39, 39), &Rgba([0, 0, 255, 255]));
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(processor.service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn new_region_reuses_cleaned_output_without_calling_service() {
        let processor = BatchProcessor::new(HalfSizeBlue::default());
        let ids = processor.ingest(vec![red_file("a.png")]).await.unwrap();
        processor.process(ids[0], None).await.unwrap();
        let first = processor.item(ids[0]).await.unwrap();

        let zone = Region::new(0.0, 0.0, 50.0, 50.0);
        let status = processor.process(ids[0], Some(zone)).await.unwrap();
        assert_eq!(status, ItemStatus::Done);
        assert_eq!(processor.service.calls.load(Ordering::SeqCst), 1);

        let second = processor.item(ids[0]).await.unwrap();
        assert_eq!(second.region(), zone);
        assert_eq!(second.cleaned_bytes(), first.cleaned_bytes());
        assert_ne!(second.final_bytes(), first.final_bytes());
    }

    #[tokio::test]
    async fn service_failure_is_recorded_on_the_item() {
        let processor = BatchProcessor::new(AlwaysFails);
        let ids = processor.ingest(vec![red_file("a.png")]).await.unwrap();
        let zone = Region::new(10.0, 10.0, 10.0, 10.0);

        let status = processor.process(ids[0], Some(zone)).await.unwrap();
        assert_eq!(status, ItemStatus::Failed);

        let item = processor.item(ids[0]).await.unwrap();
        assert_eq!(item.region(), zone);
        assert!(item.cleaned_bytes().is_none());
        assert!(item
            .error_message()
            .unwrap()
            .contains("no image data found"));
    }

    #[tokio::test]
    async fn decode_failure_keeps_previous_cleaned_bytes() {
        let processor = BatchProcessor::new(HalfSizeBlue::default());
        let ids = processor.ingest(vec![red_file("a.png")]).await.unwrap();
        processor.process(ids[0], None).await.unwrap();

        // Corrupt the cache in place to force a compositing failure.
        processor.store.lock().await.get_mut(ids[0]).unwrap().cleaned =
            Some(Arc::from(&b"not an image"[..]));
        let status = processor.process(ids[0], None).await.unwrap();
        assert_eq!(status, ItemStatus::Failed);

        let item = processor.item(ids[0]).await.unwrap();
        assert_eq!(item.cleaned_bytes(), Some(&b"not an image"[..]));
        assert!(item.error_message().unwrap().contains("cleaned image"));
    }

    #[tokio::test]
    async fn unknown_and_running_items_are_rejected() {
        let processor = BatchProcessor::new(HalfSizeBlue::default());
        assert!(matches!(
            processor.process(ItemId::new(), None).await,
            Err(Error::UnknownItem(_))
        ));

        let ids = processor.ingest(vec![red_file("a.png")]).await.unwrap();
        processor.store.lock().await.get_mut(ids[0]).unwrap().status = ItemStatus::Running;
        let zone = Region::new(0.0, 0.0, 10.0, 10.0);
        assert!(matches!(
            processor.process(ids[0], Some(zone)).await,
            Err(Error::AlreadyRunning(_))
        ));
        assert_eq!(processor.item(ids[0]).await.unwrap().region(), Region::default());
    }

    #[tokio::test]
    async fn ingest_copies_default_region_and_rejects_unsupported() {
        let processor = BatchProcessor::new(HalfSizeBlue::default());
        let first = processor.ingest(vec![red_file("a.png")]).await.unwrap();

        let anchored = Region::anchored_bottom_right(30.0, 30.0);
        processor.set_default_region(anchored).await;
        let second = processor.ingest(vec![red_file("b.png")]).await.unwrap();

        assert_eq!(processor.item(first[0]).await.unwrap().region(), Region::default());
        assert_eq!(processor.item(second[0]).await.unwrap().region(), anchored);

        let err = processor
            .ingest(vec![
                red_file("c.png"),
                IngestFile::new("d.gif", "image/gif", vec![]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert_eq!(processor.items().await.len(), 2);
    }

    #[tokio::test]
    async fn export_only_done_items() {
        let processor = BatchProcessor::new(HalfSizeBlue::default());
        let ids = processor
            .ingest(vec![red_file("a.jpg"), red_file("b.png")])
            .await
            .unwrap();
        processor.process(ids[1], None).await.unwrap();

        assert!(processor.export(ids[0]).await.is_none());
        let all = processor.export_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, ids[1]);
        assert_eq!(all[0].file_name, "clean-b.png");
        assert_eq!(
            image::guess_format(&all[0].bytes).unwrap(),
            image::ImageFormat::Png
        );
    }

    /// Succeeds with bytes that are not an image on the first call only.
    #[derive(Default)]
    struct GarbageOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CleanupService for GarbageOnce {
        async fn clean(&self, request: CleanupRequest) -> Result<CleanupResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let image_bytes = if call == 0 {
                b"not an image".to_vec()
            } else {
                request.image_bytes
            };
            Ok(CleanupResponse {
                image_bytes,
                mime_type: "image/png".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn compositing_failure_does_not_cache_fresh_cleaned_bytes() {
        let processor = BatchProcessor::new(GarbageOnce::default());
        let ids = processor.ingest(vec![red_file("a.png")]).await.unwrap();

        let status = processor.process(ids[0], None).await.unwrap();
        assert_eq!(status, ItemStatus::Failed);
        let item = processor.item(ids[0]).await.unwrap();
        assert!(item.cleaned_bytes().is_none());
        assert!(item.final_bytes().is_none());
        assert!(item.error_message().unwrap().contains("cleaned image"));

        let status = processor.process(ids[0], None).await.unwrap();
        assert_eq!(status, ItemStatus::Done);
        assert_eq!(processor.service.calls.load(Ordering::SeqCst), 2);
        assert!(processor.item(ids[0]).await.unwrap().cleaned_bytes().is_some());
    }

    /// Holds every call until released, then fails it.
    #[derive(Default)]
    struct Gate {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl CleanupService for Gate {
        async fn clean(&self, _request: CleanupRequest) -> Result<CleanupResponse> {
            self.entered.notify_one();
            self.release.notified().await;
            Err(Error::Service("no image data found in response".to_string()))
        }
    }

    #[tokio::test]
    async fn removal_during_processing_discards_the_result() {
        let processor = BatchProcessor::new(Gate::default());
        let ids = processor.ingest(vec![red_file("a.png")]).await.unwrap();

        let (result, ()) = tokio::join!(processor.process(ids[0], None), async {
            processor.service.entered.notified().await;
            assert!(processor.remove(ids[0]).await.is_some());
            processor.service.release.notify_one();
        });

        assert!(matches!(result, Err(Error::UnknownItem(id)) if id == ids[0]));
        assert!(processor.items().await.is_empty());
    }

    #[tokio::test]
    async fn items_removed_mid_batch_are_counted_as_skipped() {
        let processor = BatchProcessor::new(Gate::default());
        let ids = processor.ingest(vec![red_file("a.png")]).await.unwrap();

        let (report, ()) = tokio::join!(processor.process_all(), async {
            processor.service.entered.notified().await;
            processor.remove(ids[0]).await;
            processor.service.release.notify_one();
        });

        assert_eq!(report.submitted, 1);
        assert_eq!((report.done, report.failed, report.skipped), (0, 0, 1));
    }

    #[tokio::test]
    async fn export_all_keeps_names_unique() {
        let processor = BatchProcessor::new(HalfSizeBlue::default());
        processor
            .ingest(vec![red_file("a.jpg"), red_file("a.png"), red_file("a.webp")])
            .await
            .unwrap();
        processor.process_all().await;

        let names: Vec<_> = processor
            .export_all()
            .await
            .into_iter()
            .map(|e| e.file_name)
            .collect();
        assert_eq!(names, ["clean-a.png", "clean-a-2.png", "clean-a-3.png"]);
    }

    #[tokio::test]
    async fn removed_item_is_gone() {
        let processor = BatchProcessor::new(HalfSizeBlue::default());
        let ids = processor.ingest(vec![red_file("a.png")]).await.unwrap();
        assert!(processor.remove(ids[0]).await.is_some());
        assert!(processor.item(ids[0]).await.is_none());
        assert!(matches!(
            processor.process(ids[0], None).await,
            Err(Error::UnknownItem(_))
        ));
    }

    #[test]
    fn zero_group_size_is_rejected() {
        let mut config = Config::default();
        config.batch.group_size = 0;
        assert!(BatchProcessor::with_config(AlwaysFails, &config).is_err());
    }
}
