//! Create → update → delete lifecycle: audit trail, commits, and scoped
//! history.
#![allow(clippy::expect_used)]

use aecos_core::audit::AuditFilter;
use aecos_core::element::MaterialLayer;
use aecos_core::facade::{AecOs, AecOsOptions};
use aecos_core::store::{ElementUpdate, NewElement};

#[test]
fn lifecycle_preserves_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let os = AecOs::open_with(
        dir.path(),
        AecOsOptions {
            user: "historian".to_owned(),
            ..AecOsOptions::default()
        },
    )
    .expect("open");

    let created = os
        .create_element(NewElement {
            ifc_class: "IfcWall".to_owned(),
            name: Some("Wall E".to_owned()),
            materials: vec![MaterialLayer::new("Concrete", Some(200.0), "wall")],
            ..NewElement::default()
        })
        .expect("create");
    let id = created.value.global_id.to_string();

    let updated = os
        .update_element(
            &id,
            &ElementUpdate {
                name: Some("Wall E (renamed)".to_owned()),
                ..ElementUpdate::default()
            },
        )
        .expect("update");
    let deleted = os.delete_element(&id).expect("delete");
    assert!(deleted.value);

    // Three audit entries, in order, all attributed.
    let entries = os.get_audit_log(&AuditFilter::default()).expect("audit");
    let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        vec!["create_element", "update_element", "delete_element"]
    );
    for entry in &entries {
        assert_eq!(entry.user, "historian");
        assert_eq!(entry.resource, id);
    }
    assert!(os.verify_audit_chain().expect("verify"));

    // Three version commits scoped to the element's folder, newest first.
    for mutation_commit in [&created.commit, &updated.commit, &deleted.commit] {
        assert!(mutation_commit.is_some(), "every lifecycle step commits");
    }
    let history = os.history(&id, 50).expect("history");
    let messages: Vec<&str> = history.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages.len(), 3);
    assert!(messages[0].starts_with("chore: delete element"));
    assert!(messages[1].starts_with("fix: update element"));
    assert!(messages[2].starts_with("feat: create element"));

    // The folder is gone and the tree is clean.
    assert!(os.get_element(&id).expect("get").is_none());
    assert!(os.is_clean().expect("clean"));
}

#[test]
fn commit_count_grows_by_exactly_one_per_mutation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let os = AecOs::open(dir.path()).expect("open");

    let count_commits = || -> usize {
        let repo = git2::Repository::open(dir.path()).expect("repo");
        let mut walk = repo.revwalk().expect("walk");
        walk.push_head().expect("head");
        walk.count()
    };

    let before = count_commits();
    let created = os
        .create_element(NewElement {
            ifc_class: "IfcSlab".to_owned(),
            ..NewElement::default()
        })
        .expect("create");
    assert_eq!(count_commits(), before + 1);

    let id = created.value.global_id.to_string();
    os.update_element(
        &id,
        &ElementUpdate {
            name: Some("Slab".to_owned()),
            ..ElementUpdate::default()
        },
    )
    .expect("update");
    assert_eq!(count_commits(), before + 2);

    os.delete_element(&id).expect("delete");
    assert_eq!(count_commits(), before + 3);
}

#[test]
fn diff_shows_the_renamed_element() {
    let dir = tempfile::tempdir().expect("tempdir");
    let os = AecOs::open(dir.path()).expect("open");

    let created = os
        .create_element(NewElement {
            ifc_class: "IfcWall".to_owned(),
            name: Some("Before".to_owned()),
            ..NewElement::default()
        })
        .expect("create");
    let id = created.value.global_id.to_string();
    os.update_element(
        &id,
        &ElementUpdate {
            name: Some("After".to_owned()),
            ..ElementUpdate::default()
        },
    )
    .expect("update");

    let text = os.diff_element(&id, "HEAD~1", "HEAD").expect("diff");
    assert!(text.contains("Before"));
    assert!(text.contains("After"));
}
