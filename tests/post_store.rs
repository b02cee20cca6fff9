//! Post Store Integration Tests
//!
//! Tests for reading and writing JSONL post files.

use microneel::core::{read_posts, write_posts, PostStore};
use microneel::domain::{AnnotationKind, Post};
use tempfile::TempDir;

#[tokio::test]
async fn test_write_then_read() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("out").join("posts.jsonl");

    let mut first = Post::new("twitter:1").with_text("ciao @bob");
    first.add_annotation(AnnotationKind::Entity, 0, 4, "ml").unwrap();
    let second = Post::new("twitter:2").with_text("Città & <tag>");

    write_posts(&path, &[first.clone(), second]).await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
    // No HTML escaping of the text
    assert!(content.contains("Città & <tag>"));

    let posts = read_posts(&path).await.unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].id(), "twitter:1");
    assert_eq!(posts[0].annotations().len(), first.annotations().len());
    assert_eq!(posts[1].text(), Some("Città & <tag>"));
}

#[tokio::test]
async fn test_read_mixed_formats() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("posts.txt");
    std::fs::write(
        &path,
        "# exported posts\n\
         {\"id\":\"twitter:10\",\"text\":\"#buongiorno a tutti\"}\n\
         \n\
         11\tnon è vero\n\
         12\n\
         not a post at all\n",
    )
    .unwrap();

    let posts = read_posts(&path).await.unwrap();
    let ids: Vec<&str> = posts.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec!["twitter:10", "twitter:11", "twitter:12"]);

    // JSON lines are loaded as stored, without detection
    assert!(posts[0].annotations().is_empty());
    assert_eq!(posts[1].text(), Some("non è vero"));
    assert_eq!(posts[2].platform_id(), Some(12));
}

#[tokio::test]
async fn test_invalid_utf8_line_is_skipped() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("posts.jsonl");

    let mut content = Vec::new();
    content.extend_from_slice(b"{\"id\":\"twitter:1\",\"text\":\"uno\"}\n");
    content.extend_from_slice(b"{\"id\":\"twitter:\xff\xfe\"}\n");
    content.extend_from_slice(b"{\"id\":\"twitter:3\",\"text\":\"tre\"}\r\n");
    std::fs::write(&path, content).unwrap();

    let posts = read_posts(&path).await.unwrap();
    let ids: Vec<&str> = posts.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec!["twitter:1", "twitter:3"]);
    assert_eq!(posts[1].text(), Some("tre"));
}

#[tokio::test]
async fn test_append_and_find() {
    let temp = TempDir::new().unwrap();
    let store = PostStore::new(temp.path().join("posts.jsonl"));

    store.append(&Post::new("twitter:1").with_text("uno")).await.unwrap();
    store.append(&Post::new("twitter:2").with_text("due")).await.unwrap();

    let found = store.find("twitter:2").await.unwrap().unwrap();
    assert_eq!(found.text(), Some("due"));
    assert!(store.find("twitter:3").await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let result = read_posts(&temp.path().join("missing.jsonl")).await;
    assert!(result.is_err());
}
