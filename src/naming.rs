//! Naming conventions linking an input object to its result object.

/// `pj3-img-in` -> `pj3-img-out`, `videos-input` -> `videos-output`.
///
/// `"input"` is rewritten before the shorter `"in"` substitution runs on what
/// remains, so the freshly written `"output"` is never touched again.
pub fn derive_output_bucket(input_bucket: &str) -> String {
    input_bucket.replace("input", "output").replace("in", "out")
}

/// The video key with the extension of its last path component removed.
pub fn derive_result_key(video_key: &str) -> String {
    let (dir, file) = match video_key.rfind('/') {
        Some(idx) => video_key.split_at(idx + 1),
        None => ("", video_key),
    };
    let stem = match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    };
    format!("{dir}{stem}")
}

/// Flattens an object key into a single file name usable in scratch space.
pub fn scratch_file_name(key: &str) -> String {
    key.replace('/', "_")
}
