//! Friendly public download URLs for Backblaze B2 buckets.

/// Public URL for `key` when `endpoint_host` is a Backblaze B2 S3 endpoint.
///
/// `s3.us-east-005.backblazeb2.com` maps to `https://f005.backblazeb2.com/file/<bucket>/<key>`.
/// The URL only works when the bucket is public.
pub fn friendly_public_url(endpoint_host: &str, bucket: &str, key: &str) -> Option<String> {
    if !endpoint_host.ends_with(".backblazeb2.com") {
        return None;
    }
    let region = endpoint_host.split('.').nth(1)?;
    let cluster_id = region.rsplit('-').next().filter(|c| !c.is_empty())?;
    Some(format!(
        "https://f{cluster_id}.backblazeb2.com/file/{bucket}/{key}"
    ))
}
