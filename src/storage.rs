//! Public object URLs: recognising them inside listing rows, splitting
//! them into bucket and path, and removing the objects in batches.

use std::collections::HashSet;

use lazy_static::lazy_static;
use log::info;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::Value;

use crate::supabase::{ObjectStorage, Row, StoreError};

/// Maximum number of paths per remove call.
pub const REMOVE_CHUNK: usize = 100;

const IMAGE_FIELDS: [&str; 3] = ["image_urls", "images", "photos"];

lazy_static! {
    static ref PUBLIC_OBJECT_URL: Regex =
        Regex::new(r"/storage/v1/object/public/[^/]+/.+").unwrap();
    static ref BUCKET_AND_PATH: Regex = Regex::new(r"/object/public/([^/]+)/(.+)$").unwrap();
}

pub fn public_url(base_url: &str, bucket: &str, path: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        path
    )
}

pub fn is_public_object_url(value: &str) -> bool {
    PUBLIC_OBJECT_URL.is_match(value)
}

/// Bucket and percent-decoded object path of a public URL.
pub fn split_public_url(url: &str) -> Option<(String, String)> {
    let captures = BUCKET_AND_PATH.captures(url)?;
    let bucket = captures.get(1)?.as_str().to_string();
    let path = percent_decode_str(captures.get(2)?.as_str())
        .decode_utf8_lossy()
        .into_owned();
    Some((bucket, path))
}

/// Every distinct public object URL in the row, in first-seen order.
///
/// Only the first of `image_urls`, `images`, `photos` that is present and
/// non-null is searched; without any of them the whole row is.
pub fn collect_image_urls(row: &Row) -> Vec<String> {
    let root = IMAGE_FIELDS
        .iter()
        .find_map(|field| row.get(*field).filter(|v| !v.is_null()));

    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    match root {
        Some(value) => visit(value, &mut seen, &mut urls),
        None => row
            .values()
            .for_each(|value| visit(value, &mut seen, &mut urls)),
    }
    urls
}

fn visit(value: &Value, seen: &mut HashSet<String>, urls: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if is_public_object_url(s) && seen.insert(s.clone()) {
                urls.push(s.clone());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| visit(item, seen, urls)),
        Value::Object(map) => map.values().for_each(|item| visit(item, seen, urls)),
        _ => {}
    }
}

/// Groups URLs by bucket, keeping the order buckets and paths first appear
/// in. URLs that do not parse are skipped.
pub fn group_by_bucket(urls: &[String]) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for (bucket, path) in urls.iter().filter_map(|url| split_public_url(url)) {
        match groups.iter_mut().find(|(b, _)| *b == bucket) {
            Some((_, paths)) => paths.push(path),
            None => groups.push((bucket, vec![path])),
        }
    }
    groups
}

/// Removes the objects behind `urls`, bucket by bucket, at most
/// [`REMOVE_CHUNK`] paths per call. Stops at the first error.
pub async fn remove_images(storage: &dyn ObjectStorage, urls: &[String]) -> Result<(), StoreError> {
    for (bucket, paths) in group_by_bucket(urls) {
        for chunk in paths.chunks(REMOVE_CHUNK) {
            storage.remove(&bucket, chunk).await?;
        }
        info!("removed {} object(s) from bucket {}", paths.len(), bucket);
    }
    Ok(())
}
