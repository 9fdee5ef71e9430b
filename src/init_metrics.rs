pub(super) fn init_metrics() {
    describe_ingest();
    describe_stage();
    describe_process();
    describe_store();
    describe_repo();
}

fn describe_ingest() {
    metrics::describe_histogram!(
        INGEST_VIDEO,
        "Timings for handling a video upload from staging to metadata update"
    );
    metrics::describe_histogram!(
        INGEST_THUMBNAIL,
        "Timings for handling a thumbnail upload from staging to metadata update"
    );
    metrics::describe_counter!(
        INGEST_PUBLISHED,
        "How many uploads have been published and recorded"
    );
    metrics::describe_counter!(
        INGEST_FAILED,
        "How many uploads have failed, labeled by the stage that failed"
    );
}

pub(crate) const INGEST_VIDEO: &str = "tubely.ingest.video";
pub(crate) const INGEST_THUMBNAIL: &str = "tubely.ingest.thumbnail";
pub(crate) const INGEST_PUBLISHED: &str = "tubely.ingest.published";
pub(crate) const INGEST_FAILED: &str = "tubely.ingest.failed";

fn describe_stage() {
    metrics::describe_counter!(
        UPLOAD_STAGED,
        "How many uploads have been written to the temporary directory"
    );
}

pub(crate) const UPLOAD_STAGED: &str = "tubely.upload.staged";

fn describe_process() {
    metrics::describe_counter!(
        PROCESS_START,
        "How many times tubely has spawned a background process"
    );
    metrics::describe_histogram!(
        PROCESS_DURATION,
        "Timings for all background processes"
    );
    metrics::describe_counter!(
        PROCESS_END,
        "How many times a background process has completed"
    );
}

pub(crate) const PROCESS_START: &str = "tubely.process.start";
pub(crate) const PROCESS_DURATION: &str = "tubely.process.duration";
pub(crate) const PROCESS_END: &str = "tubely.process.end";

fn describe_store() {
    metrics::describe_histogram!(
        OBJECT_STORAGE_PUT,
        "Timings for single-request uploads to object storage"
    );
    metrics::describe_histogram!(
        OBJECT_STORAGE_MULTIPART,
        "Timings for multipart uploads to object storage"
    );
    metrics::describe_counter!(
        OBJECT_STORAGE_PARTS,
        "How many parts have been sent in multipart uploads"
    );
}

pub(crate) const OBJECT_STORAGE_PUT: &str = "tubely.object-storage.put";
pub(crate) const OBJECT_STORAGE_MULTIPART: &str = "tubely.object-storage.multipart";
pub(crate) const OBJECT_STORAGE_PARTS: &str = "tubely.object-storage.parts";

fn describe_repo() {
    metrics::describe_histogram!(
        SLED_GET,
        "Timings for reading video records from sled"
    );
    metrics::describe_histogram!(
        SLED_SET,
        "Timings for writing video records to sled"
    );
}

pub(crate) const SLED_GET: &str = "tubely.sled.get";
pub(crate) const SLED_SET: &str = "tubely.sled.set";
