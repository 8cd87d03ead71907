use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tagstore_core::{
    pick_color, Color, EntityKind, IndexError, MemoryIndex, NewResource, NewTag, RecordStore,
    RelationshipIndex, RepoError, Repository, Resource, ResourceParams, SqliteRecordStore, Tag,
    TagParams, ValidationError, PALETTE,
};

type TestRepository = Repository<SqliteRecordStore, MemoryIndex>;

fn setup() -> TestRepository {
    Repository::new(SqliteRecordStore::open(None).unwrap(), MemoryIndex::new()).unwrap()
}

fn ids(resources: &[Resource]) -> Vec<&str> {
    resources.iter().map(|resource| resource.id.as_str()).collect()
}

/// Memory index whose writes can be switched to fail and whose resource
/// lookups can report ids the store never saw.
#[derive(Default)]
struct FlakyIndex {
    inner: MemoryIndex,
    /// Fails every write.
    fail_writes: Arc<AtomicBool>,
    /// Fails only resource/tag link writes.
    fail_links: Arc<AtomicBool>,
    ghost_ids: Vec<String>,
}

impl FlakyIndex {
    fn check(&self, flag: &AtomicBool) -> Result<(), IndexError> {
        if flag.load(Ordering::SeqCst) {
            return Err(IndexError::InvalidData("injected write failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), IndexError> {
        self.check(&self.fail_writes)
    }

    fn check_link(&self) -> Result<(), IndexError> {
        self.check_write()?;
        self.check(&self.fail_links)
    }
}

fn flaky_repo() -> (Repository<SqliteRecordStore, FlakyIndex>, Arc<AtomicBool>, Arc<AtomicBool>) {
    let fail_writes = Arc::new(AtomicBool::new(false));
    let fail_links = Arc::new(AtomicBool::new(false));
    let index = FlakyIndex {
        fail_writes: Arc::clone(&fail_writes),
        fail_links: Arc::clone(&fail_links),
        ..FlakyIndex::default()
    };
    let repo = Repository::new(SqliteRecordStore::open(None).unwrap(), index).unwrap();
    (repo, fail_writes, fail_links)
}

impl RelationshipIndex for FlakyIndex {
    fn reset(&self) -> Result<(), IndexError> {
        self.inner.reset()
    }

    fn create_resource(&self, resource: &Resource) -> Result<(), IndexError> {
        self.check_write()?;
        self.inner.create_resource(resource)
    }

    fn create_tag(&self, tag: &Tag) -> Result<(), IndexError> {
        self.check_write()?;
        self.inner.create_tag(tag)
    }

    fn add_resource_tag(&self, resource: &Resource, tag_name: &str) -> Result<(), IndexError> {
        self.check_link()?;
        self.inner.add_resource_tag(resource, tag_name)
    }

    fn delete_resource_tag(&self, resource: &Resource, tag_name: &str) -> Result<(), IndexError> {
        self.check_link()?;
        self.inner.delete_resource_tag(resource, tag_name)
    }

    fn find_all_resources(&self, params: &ResourceParams) -> Result<Vec<String>, IndexError> {
        let mut ids = self.inner.find_all_resources(params)?;
        ids.extend(self.ghost_ids.iter().cloned());
        ids.sort();
        Ok(ids)
    }

    fn find_all_tags(&self, params: &TagParams) -> Result<Vec<String>, IndexError> {
        self.inner.find_all_tags(params)
    }

    fn edge_count(&self) -> Result<usize, IndexError> {
        self.inner.edge_count()
    }
}

#[test]
fn create_resource_roundtrip_returns_materialized_tags() {
    let repo = setup();
    let created = repo
        .create_resource(&NewResource::new("a", "x", "book").tagged("red").tagged("blue"))
        .unwrap();

    assert_eq!(created.tag_names(), vec!["red", "blue"]);
    for tag in &created.tags {
        assert!(PALETTE.contains(&tag.color.as_str()));
    }

    let loaded = repo.find_resource_by_id("a").unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn every_resource_tag_resolves_to_a_tag_record() {
    let repo = setup();
    repo.create_resource(&NewResource::new("a", "x", "book").tagged("red"))
        .unwrap();
    repo.create_resource(&NewResource::new("b", "y", "book").tagged("green"))
        .unwrap();
    repo.add_tag_to_resource("a", "blue").unwrap();

    for resource in repo.find_all_resources(None).unwrap() {
        for tag in &resource.tags {
            assert_eq!(&repo.find_tag_by_name(&tag.name).unwrap(), tag);
        }
    }
}

#[test]
fn create_tag_is_idempotent_and_keeps_first_color() {
    let repo = setup();
    let first = repo.create_tag(&NewTag::named("red")).unwrap();
    let second = repo.create_tag(&NewTag::named("red")).unwrap();
    let recolored = repo
        .create_tag(&NewTag::with_color("red", Color::parse("#123456").unwrap()))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, recolored);
    assert_eq!(repo.find_all_tags(None).unwrap(), vec![first]);
}

#[test]
fn create_tag_keeps_supplied_color_for_new_tag() {
    let repo = setup();
    let color = Color::parse("#00ff00").unwrap();
    let created = repo
        .create_tag(&NewTag::with_color("lime", color.clone()))
        .unwrap();
    assert_eq!(created.color, color);
    assert_eq!(created.color.as_str(), "#00FF00");
}

#[test]
fn existing_tag_color_wins_when_resource_references_it() {
    let repo = setup();
    let red = repo
        .create_tag(&NewTag::with_color("red", pick_color(7)))
        .unwrap();
    let created = repo
        .create_resource(&NewResource::new("a", "x", "book").tagged("red"))
        .unwrap();
    assert_eq!(created.tags, vec![red]);
}

#[test]
fn filtered_find_intersects_type_and_name() {
    let repo = setup();
    repo.create_resource(&NewResource::new("a", "x", "book")).unwrap();
    repo.create_resource(&NewResource::new("b", "y", "book")).unwrap();
    repo.create_resource(&NewResource::new("c", "x", "movie")).unwrap();

    let both = ResourceParams {
        kind: Some("book".to_string()),
        name: Some("x".to_string()),
        ..ResourceParams::default()
    };
    assert_eq!(ids(&repo.find_all_resources(Some(&both)).unwrap()), vec!["a"]);

    let books = ResourceParams::by_kind("book");
    assert_eq!(
        ids(&repo.find_all_resources(Some(&books)).unwrap()),
        vec!["a", "b"]
    );

    assert_eq!(
        ids(&repo.find_all_resources(None).unwrap()),
        vec!["a", "b", "c"]
    );
}

#[test]
fn params_without_active_filter_fall_back_to_scan() {
    let repo = setup();
    repo.create_resource(&NewResource::new("a", "x", "book")).unwrap();
    repo.create_resource(&NewResource::new("b", "y", "movie")).unwrap();

    let ignored = ResourceParams::from_pairs([("owner", "me")]);
    assert_eq!(
        ids(&repo.find_all_resources(Some(&ignored)).unwrap()),
        vec!["a", "b"]
    );
}

#[test]
fn find_resources_by_tag_uses_tag_edges() {
    let repo = setup();
    repo.create_resource(&NewResource::new("a", "x", "book").tagged("red"))
        .unwrap();
    repo.create_resource(&NewResource::new("b", "y", "book")).unwrap();
    repo.add_tag_to_resource("b", "red").unwrap();
    repo.create_resource(&NewResource::new("c", "z", "book").tagged("blue"))
        .unwrap();

    assert_eq!(ids(&repo.find_resources_by_tag("red").unwrap()), vec!["a", "b"]);
    assert!(repo.find_resources_by_tag("purple").unwrap().is_empty());
}

#[test]
fn filtered_tag_find_hydrates_from_store() {
    let repo = setup();
    let red = repo
        .create_tag(&NewTag::with_color("red", pick_color(4)))
        .unwrap();
    repo.create_tag(&NewTag::with_color("blue", pick_color(5)))
        .unwrap();

    let params = TagParams::from_pairs([("color", pick_color(4).as_str())]);
    assert_eq!(repo.find_all_tags(Some(&params)).unwrap(), vec![red]);
}

#[test]
fn create_resource_conflict_leaves_existing_record_unchanged() {
    let repo = setup();
    let original = repo
        .create_resource(&NewResource::new("a", "x", "book").tagged("red"))
        .unwrap();

    let err = repo
        .create_resource(&NewResource::new("a", "other", "movie").tagged("blue"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(ref id) if id == "a"));
    assert_eq!(repo.find_resource_by_id("a").unwrap(), original);
    assert!(matches!(
        repo.find_tag_by_name("blue").unwrap_err(),
        RepoError::NotFound {
            entity: EntityKind::Tag,
            ..
        }
    ));
}

#[test]
fn create_resource_with_missing_field_is_invalid_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.db");
    {
        let repo = Repository::new(
            SqliteRecordStore::open(Some(path.as_path())).unwrap(),
            MemoryIndex::new(),
        )
        .unwrap();
        let err = repo
            .create_resource(&NewResource::new("", "x", "y").tagged("red"))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Invalid(ValidationError::MissingField("id"))
        ));
    }

    let store = SqliteRecordStore::open(Some(path.as_path())).unwrap();
    assert!(store.get_all_resources().unwrap().is_empty());
    assert!(store.get_all_tags().unwrap().is_empty());
}

#[test]
fn duplicate_tags_in_create_request_collapse() {
    let repo = setup();
    let created = repo
        .create_resource(
            &NewResource::new("a", "x", "book")
                .tagged("red")
                .tagged("blue")
                .tagged("red"),
        )
        .unwrap();
    assert_eq!(created.tag_names(), vec!["red", "blue"]);
}

#[test]
fn add_tag_twice_keeps_single_occurrence_at_front() {
    let repo = setup();
    repo.create_resource(&NewResource::new("a", "x", "book").tagged("blue"))
        .unwrap();

    repo.add_tag_to_resource("a", "red").unwrap();
    let updated = repo.add_tag_to_resource("a", "red").unwrap();
    assert_eq!(updated.tag_names(), vec!["red", "blue"]);

    let moved = repo.add_tag_to_resource("a", "blue").unwrap();
    assert_eq!(moved.tag_names(), vec!["blue", "red"]);
    assert_eq!(repo.find_resource_by_id("a").unwrap(), moved);
}

#[test]
fn delete_tag_detaches_and_removes_index_edges() {
    let repo = setup();
    repo.create_resource(&NewResource::new("a", "x", "book").tagged("red").tagged("blue"))
        .unwrap();

    let updated = repo.delete_tag_from_resource("a", "red").unwrap();
    assert_eq!(updated.tag_names(), vec!["blue"]);
    assert_eq!(repo.find_resource_by_id("a").unwrap(), updated);
    assert!(repo.find_resources_by_tag("red").unwrap().is_empty());
    assert!(repo.find_tag_by_name("red").is_ok());

    let unchanged = repo.delete_tag_from_resource("a", "red").unwrap();
    assert_eq!(unchanged, updated);
}

#[test]
fn tag_mutations_on_missing_resource_report_not_found() {
    let repo = setup();
    let err = repo.add_tag_to_resource("ghost", "red").unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound { entity: EntityKind::Resource, ref key } if key == "ghost"
    ));
    let err = repo.delete_tag_from_resource("ghost", "red").unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
    assert!(matches!(
        repo.find_resource_by_id("ghost").unwrap_err(),
        RepoError::NotFound { .. }
    ));
}

#[test]
fn hydration_miss_truncates_filtered_results() {
    let index = FlakyIndex {
        ghost_ids: vec!["b-ghost".to_string()],
        ..FlakyIndex::default()
    };
    let repo = Repository::new(SqliteRecordStore::open(None).unwrap(), index).unwrap();
    repo.create_resource(&NewResource::new("a", "x", "book")).unwrap();
    repo.create_resource(&NewResource::new("c", "z", "book")).unwrap();

    let found = repo
        .find_all_resources(Some(&ResourceParams::by_kind("book")))
        .unwrap();
    assert_eq!(ids(&found), vec!["a"]);
}

#[test]
fn index_failure_after_store_write_is_reported_and_retry_heals() {
    let (repo, _, fail_links) = flaky_repo();
    repo.create_resource(&NewResource::new("a", "x", "book")).unwrap();
    repo.create_tag(&NewTag::named("red")).unwrap();

    fail_links.store(true, Ordering::SeqCst);
    let err = repo.add_tag_to_resource("a", "red").unwrap_err();
    assert!(matches!(err, RepoError::Query(_)));
    assert!(repo.find_resource_by_id("a").unwrap().has_tag("red"));
    assert!(repo.find_resources_by_tag("red").unwrap().is_empty());

    fail_links.store(false, Ordering::SeqCst);
    let healed = repo.add_tag_to_resource("a", "red").unwrap();
    assert_eq!(healed.tag_names(), vec!["red"]);
    assert_eq!(ids(&repo.find_resources_by_tag("red").unwrap()), vec!["a"]);
}

#[test]
fn create_tag_retry_restores_missing_index_edges() {
    let (repo, fail_writes, _) = flaky_repo();

    fail_writes.store(true, Ordering::SeqCst);
    let err = repo.create_tag(&NewTag::named("red")).unwrap_err();
    assert!(matches!(err, RepoError::Query(_)));
    let stored = repo.find_tag_by_name("red").unwrap();
    let by_name = TagParams::from_pairs([("name", "red")]);
    assert!(repo.find_all_tags(Some(&by_name)).unwrap().is_empty());

    fail_writes.store(false, Ordering::SeqCst);
    assert_eq!(repo.create_tag(&NewTag::named("red")).unwrap(), stored);
    assert_eq!(repo.find_all_tags(Some(&by_name)).unwrap(), vec![stored.clone()]);

    let by_color = TagParams::from_pairs([("color", stored.color.as_str())]);
    assert_eq!(repo.find_all_tags(Some(&by_color)).unwrap(), vec![stored]);
}

#[test]
fn create_resource_retry_reports_conflict_and_restores_index() {
    let (repo, fail_writes, _) = flaky_repo();

    fail_writes.store(true, Ordering::SeqCst);
    let err = repo
        .create_resource(&NewResource::new("a", "x", "book"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Query(_)));
    let stored = repo.find_resource_by_id("a").unwrap();
    let books = ResourceParams::by_kind("book");
    assert!(repo.find_all_resources(Some(&books)).unwrap().is_empty());

    fail_writes.store(false, Ordering::SeqCst);
    let err = repo
        .create_resource(&NewResource::new("a", "x", "book"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(ref id) if id == "a"));
    assert_eq!(repo.find_all_resources(Some(&books)).unwrap(), vec![stored]);
}

#[test]
fn concurrent_tagging_of_one_resource_keeps_store_and_index_in_step() {
    let repo = Arc::new(setup());
    repo.create_resource(&NewResource::new("r", "x", "book")).unwrap();

    let handles = (0..8)
        .map(|n| {
            let repo = Arc::clone(&repo);
            std::thread::spawn(move || {
                let tag = format!("t{n}");
                repo.add_tag_to_resource("r", &tag).unwrap();
                if n % 2 == 0 {
                    repo.delete_tag_from_resource("r", &tag).unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let stored = repo.find_resource_by_id("r").unwrap();
    let mut names = stored.tag_names();
    names.sort_unstable();
    assert_eq!(names, vec!["t1", "t3", "t5", "t7"]);

    for n in 0..8 {
        let tag = format!("t{n}");
        let tagged = repo.find_resources_by_tag(&tag).unwrap();
        assert_eq!(tagged.len(), usize::from(n % 2 == 1), "index edges for {tag}");
    }
}
