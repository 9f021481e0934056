//! S3 XML response rendering.
//!
//! All S3 API responses are XML-encoded.  This module provides pure
//! helpers that produce the correct XML payloads using `quick-xml`;
//! no I/O happens here.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::store::{Bucket, ListOptions, Listing};

/// Fixed owner presented in list-buckets and ACL responses.
pub const OWNER_ID: &str = "shelfstore";
pub const OWNER_DISPLAY_NAME: &str = "ShelfStore";

const XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

// ── Error response ──────────────────────────────────────────────────

/// Render an S3 `<Error>` XML document.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>NoSuchKey</Code>
///   <Message>The specified key does not exist</Message>
///   <Resource>photos/cat.jpg</Resource>
///   <RequestId>ABCD1234ABCD1234</RequestId>
/// </Error>
/// ```
pub fn render_error(code: &str, message: &str, resource: &str, request_id: &str) -> String {
    let mut writer = start_document();

    write_simple_element_group(
        &mut writer,
        "Error",
        &[
            ("Code", code),
            ("Message", message),
            ("Resource", resource),
            ("RequestId", request_id),
        ],
    );

    finish(writer)
}

// ── ListAllMyBucketsResult ──────────────────────────────────────────

/// Render the `<ListAllMyBucketsResult>` response for `GET /`.
pub fn render_list_buckets(buckets: &[Bucket]) -> String {
    let mut writer = start_document();

    let root = BytesStart::new("ListAllMyBucketsResult").with_attributes([("xmlns", XMLNS)]);
    writer.write_event(Event::Start(root)).expect("start root");

    write_simple_element_group(
        &mut writer,
        "Owner",
        &[("ID", OWNER_ID), ("DisplayName", OWNER_DISPLAY_NAME)],
    );

    writer
        .write_event(Event::Start(BytesStart::new("Buckets")))
        .expect("start Buckets");
    for bucket in buckets {
        let creation_date = iso8601(&bucket.creation_date);
        write_simple_element_group(
            &mut writer,
            "Bucket",
            &[
                ("Name", bucket.name.as_str()),
                ("CreationDate", creation_date.as_str()),
            ],
        );
    }
    writer
        .write_event(Event::End(BytesEnd::new("Buckets")))
        .expect("end Buckets");

    writer
        .write_event(Event::End(BytesEnd::new("ListAllMyBucketsResult")))
        .expect("end root");

    finish(writer)
}

// ── ListBucketResult ────────────────────────────────────────────────

/// Render `<ListBucketResult>` for a bucket listing.
pub fn render_list_bucket_result(bucket: &str, options: &ListOptions, listing: &Listing) -> String {
    let mut writer = start_document();

    let root = BytesStart::new("ListBucketResult").with_attributes([("xmlns", XMLNS)]);
    writer.write_event(Event::Start(root)).expect("start root");

    write_text_element(&mut writer, "Name", bucket);
    write_text_element(&mut writer, "Prefix", options.prefix.as_deref().unwrap_or(""));
    write_text_element(&mut writer, "Marker", options.marker.as_deref().unwrap_or(""));
    if let Some(delimiter) = &options.delimiter {
        write_text_element(&mut writer, "Delimiter", delimiter);
    }
    write_text_element(&mut writer, "MaxKeys", &options.max_keys.to_string());
    write_text_element(
        &mut writer,
        "IsTruncated",
        if listing.is_truncated { "true" } else { "false" },
    );

    for object in &listing.objects {
        writer
            .write_event(Event::Start(BytesStart::new("Contents")))
            .expect("start Contents");
        write_text_element(&mut writer, "Key", &object.key);
        write_text_element(&mut writer, "LastModified", &iso8601(&object.modified_date));
        write_text_element(&mut writer, "ETag", &format!("\"{}\"", object.md5));
        write_text_element(&mut writer, "Size", &object.size.to_string());
        write_text_element(&mut writer, "StorageClass", "STANDARD");
        writer
            .write_event(Event::End(BytesEnd::new("Contents")))
            .expect("end Contents");
    }

    for prefix in &listing.common_prefixes {
        writer
            .write_event(Event::Start(BytesStart::new("CommonPrefixes")))
            .expect("start CommonPrefixes");
        write_text_element(&mut writer, "Prefix", prefix);
        writer
            .write_event(Event::End(BytesEnd::new("CommonPrefixes")))
            .expect("end CommonPrefixes");
    }

    writer
        .write_event(Event::End(BytesEnd::new("ListBucketResult")))
        .expect("end root");

    finish(writer)
}

// ── CopyObjectResult ────────────────────────────────────────────────

/// Render `<CopyObjectResult>` returned by `PUT` with `x-amz-copy-source`.
pub fn render_copy_object_result(md5: &str, modified: &chrono::DateTime<chrono::Utc>) -> String {
    let mut writer = start_document();

    let last_modified = iso8601(modified);
    let etag = format!("\"{md5}\"");
    write_simple_element_group(
        &mut writer,
        "CopyObjectResult",
        &[
            ("LastModified", last_modified.as_str()),
            ("ETag", etag.as_str()),
        ],
    );

    finish(writer)
}

// ── DeleteResult ────────────────────────────────────────────────────

/// Render `<DeleteResult>` for a successful batch delete.
pub fn render_delete_result(keys: &[String]) -> String {
    let mut writer = start_document();

    let root = BytesStart::new("DeleteResult").with_attributes([("xmlns", XMLNS)]);
    writer.write_event(Event::Start(root)).expect("start root");

    for key in keys {
        writer
            .write_event(Event::Start(BytesStart::new("Deleted")))
            .expect("start Deleted");
        write_text_element(&mut writer, "Key", key);
        writer
            .write_event(Event::End(BytesEnd::new("Deleted")))
            .expect("end Deleted");
    }

    writer
        .write_event(Event::End(BytesEnd::new("DeleteResult")))
        .expect("end root");

    finish(writer)
}

// ── AccessControlPolicy ─────────────────────────────────────────────

/// Render the canned `<AccessControlPolicy>` returned for `?acl`
/// requests: a fixed owner holding FULL_CONTROL.
pub fn render_access_control_policy() -> String {
    let mut writer = start_document();

    let root = BytesStart::new("AccessControlPolicy").with_attributes([("xmlns", XMLNS)]);
    writer.write_event(Event::Start(root)).expect("start root");

    write_simple_element_group(
        &mut writer,
        "Owner",
        &[("ID", OWNER_ID), ("DisplayName", OWNER_DISPLAY_NAME)],
    );

    writer
        .write_event(Event::Start(BytesStart::new("AccessControlList")))
        .expect("start AccessControlList");
    writer
        .write_event(Event::Start(BytesStart::new("Grant")))
        .expect("start Grant");

    let mut grantee = BytesStart::new("Grantee");
    grantee.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
    grantee.push_attribute(("xsi:type", "CanonicalUser"));
    writer
        .write_event(Event::Start(grantee))
        .expect("start Grantee");
    write_text_element(&mut writer, "ID", OWNER_ID);
    write_text_element(&mut writer, "DisplayName", OWNER_DISPLAY_NAME);
    writer
        .write_event(Event::End(BytesEnd::new("Grantee")))
        .expect("end Grantee");

    write_text_element(&mut writer, "Permission", "FULL_CONTROL");

    writer
        .write_event(Event::End(BytesEnd::new("Grant")))
        .expect("end Grant");
    writer
        .write_event(Event::End(BytesEnd::new("AccessControlList")))
        .expect("end AccessControlList");
    writer
        .write_event(Event::End(BytesEnd::new("AccessControlPolicy")))
        .expect("end root");

    finish(writer)
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Format a timestamp the way S3 does in XML bodies.
pub fn iso8601(time: &chrono::DateTime<chrono::Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn start_document() -> Writer<Cursor<Vec<u8>>> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .expect("xml decl");
    writer
}

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> String {
    String::from_utf8(writer.into_inner().into_inner()).expect("valid utf-8")
}

/// Write a `<tag>text</tag>` element.
fn write_text_element(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .expect("start tag");
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .expect("text");
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .expect("end tag");
}

/// Write a parent element containing a flat list of child text elements.
fn write_simple_element_group(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    parent: &str,
    children: &[(&str, &str)],
) {
    writer
        .write_event(Event::Start(BytesStart::new(parent)))
        .expect("start parent");
    for (tag, value) in children {
        write_text_element(writer, tag, value);
    }
    writer
        .write_event(Event::End(BytesEnd::new(parent)))
        .expect("end parent");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectMeta;
    use chrono::TimeZone;

    fn fixed_time() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc.with_ymd_and_hms(2026, 2, 23, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_render_error() {
        let xml = render_error("NoSuchKey", "The specified key does not exist", "a.txt", "REQ1");
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Code>NoSuchKey</Code>"));
        assert!(xml.contains("<Resource>a.txt</Resource>"));
        assert!(xml.contains("<RequestId>REQ1</RequestId>"));
    }

    #[test]
    fn test_render_list_buckets() {
        let buckets = vec![
            Bucket {
                name: "alpha".to_string(),
                creation_date: fixed_time(),
            },
            Bucket {
                name: "beta".to_string(),
                creation_date: fixed_time(),
            },
        ];
        let xml = render_list_buckets(&buckets);
        assert!(xml.contains("<ListAllMyBucketsResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">"));
        assert!(xml.contains("<Name>alpha</Name>"));
        assert!(xml.contains("<Name>beta</Name>"));
        assert!(xml.contains("<CreationDate>2026-02-23T12:00:00.000Z</CreationDate>"));
    }

    #[test]
    fn test_render_list_bucket_result() {
        let options = ListOptions {
            prefix: Some("photos/".to_string()),
            marker: None,
            max_keys: 1000,
            delimiter: Some("/".to_string()),
        };
        let listing = Listing {
            objects: vec![ObjectMeta {
                key: "photos/cat.jpg".to_string(),
                size: 5,
                md5: "5d41402abc4b2a76b9719d911017c592".to_string(),
                modified_date: fixed_time(),
                content_type: "image/jpeg".to_string(),
                content_encoding: None,
                content_disposition: None,
                custom_meta_data: Vec::new(),
            }],
            common_prefixes: vec!["photos/2026/".to_string()],
            is_truncated: true,
        };
        let xml = render_list_bucket_result("foo", &options, &listing);
        assert!(xml.contains("<Name>foo</Name>"));
        assert!(xml.contains("<Prefix>photos/</Prefix>"));
        assert!(xml.contains("<Marker></Marker>"));
        assert!(xml.contains("<Delimiter>/</Delimiter>"));
        assert!(xml.contains("<MaxKeys>1000</MaxKeys>"));
        assert!(xml.contains("<IsTruncated>true</IsTruncated>"));
        assert!(xml.contains("<Key>photos/cat.jpg</Key>"));
        // ETag quotes are escaped by the writer but remain in the text.
        assert!(xml.contains("5d41402abc4b2a76b9719d911017c592"));
        assert!(xml.contains("<CommonPrefixes><Prefix>photos/2026/</Prefix></CommonPrefixes>"));
    }

    #[test]
    fn test_render_copy_object_result() {
        let xml = render_copy_object_result("5d41402abc4b2a76b9719d911017c592", &fixed_time());
        assert!(xml.contains("<CopyObjectResult>"));
        assert!(xml.contains("<LastModified>2026-02-23T12:00:00.000Z</LastModified>"));
        assert!(xml.contains("5d41402abc4b2a76b9719d911017c592"));
    }

    #[test]
    fn test_render_delete_result() {
        let keys = vec!["a.txt".to_string(), "b/c.txt".to_string()];
        let xml = render_delete_result(&keys);
        assert!(xml.contains("<DeleteResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">"));
        assert!(xml.contains("<Deleted><Key>a.txt</Key></Deleted>"));
        assert!(xml.contains("<Deleted><Key>b/c.txt</Key></Deleted>"));
    }

    #[test]
    fn test_render_access_control_policy() {
        let xml = render_access_control_policy();
        assert!(xml.contains("<AccessControlPolicy"));
        assert!(xml.contains("xsi:type=\"CanonicalUser\""));
        assert!(xml.contains("<Permission>FULL_CONTROL</Permission>"));
    }
}
