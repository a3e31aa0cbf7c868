//! Style page lookup against both store backends

use pretty_assertions::assert_eq;
use rawcss_page::{
    ContentModel, DirectoryPageStore, MemoryPageStore, ModelDefaults, Namespace, NotFound, PageStore,
    PageTitle, StyleFilter, StyleLanguage, StylePageAccessor, TitleParser,
};
use std::fs;
use std::sync::Arc;

fn spec_title() -> PageTitle {
    PageTitle::new(Namespace::MEDIAWIKI, "RawCSS-applications.json").unwrap()
}

#[test]
fn directory_store_serves_style_pages() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("RawCSS")).unwrap();
    fs::create_dir_all(dir.path().join("MediaWiki")).unwrap();
    fs::write(dir.path().join("RawCSS/Theme.less"), "@c: red; a{color:@c}").unwrap();
    fs::write(dir.path().join("RawCSS/Reset.css"), "*{margin:0}").unwrap();
    fs::write(dir.path().join("MediaWiki/RawCSS-applications.json"), "{}").unwrap();

    let store = DirectoryPageStore::open(dir.path(), ModelDefaults::new(spec_title())).unwrap();
    let accessor = StylePageAccessor::new(store, TitleParser::new());

    let less = accessor.resolve("Theme.less", Namespace::RAWCSS).unwrap();
    assert_eq!(less.language, StyleLanguage::Less);
    assert_eq!(less.text, "@c: red; a{color:@c}");

    let css = accessor.resolve("RawCSS:Reset.css", Namespace::TEMPLATE).unwrap();
    assert_eq!(css.language, StyleLanguage::Css);

    // Specification page exists but is not a style page
    let spec = accessor.store().page(&spec_title()).unwrap();
    assert_eq!(spec.latest.unwrap().model, ContentModel::ApplicationList);
}

#[test]
fn directory_reload_changes_revision_only_when_text_changes() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("RawCSS")).unwrap();
    let file = dir.path().join("RawCSS/Theme.less");
    fs::write(&file, "a{b:c}").unwrap();

    let store = DirectoryPageStore::open(dir.path(), ModelDefaults::new(spec_title())).unwrap();
    let title = PageTitle::new(Namespace::RAWCSS, "Theme.less").unwrap();
    let first = store.page(&title).unwrap().latest.unwrap().id;

    store.reload().unwrap();
    assert_eq!(store.page(&title).unwrap().latest.unwrap().id, first);

    fs::write(&file, "a{b:d}").unwrap();
    store.reload().unwrap();
    assert_ne!(store.page(&title).unwrap().latest.unwrap().id, first);
}

#[test]
fn shared_memory_store_sees_later_saves() {
    let store = Arc::new(MemoryPageStore::new());
    let accessor = StylePageAccessor::new(Arc::clone(&store), TitleParser::new());
    let title = PageTitle::new(Namespace::RAWCSS, "Late.less").unwrap();

    assert!(matches!(
        accessor.resolve("Late.less", Namespace::RAWCSS),
        Err(NotFound::Missing { .. })
    ));

    let revision = store.save(&title, ContentModel::Less, "@x: 1;");
    let page = accessor
        .resolve_filtered("Late.less", Namespace::RAWCSS, StyleFilter::StyleLanguageOnly)
        .unwrap();
    assert_eq!(page.revision_id, revision);
}

#[test]
fn template_namespace_is_allowed_by_default() {
    let store = MemoryPageStore::new();
    let title = PageTitle::new(Namespace::TEMPLATE, "Infobox/styles.css").unwrap();
    store.save(&title, ContentModel::Css, ".infobox{float:right}");
    let accessor = StylePageAccessor::new(store, TitleParser::new());

    assert!(accessor.resolve("Template:Infobox/styles.css", Namespace::RAWCSS).is_ok());

    let restricted = accessor.with_namespaces([Namespace::RAWCSS]);
    assert!(matches!(
        restricted.resolve("Template:Infobox/styles.css", Namespace::RAWCSS),
        Err(NotFound::NamespaceNotAllowed { .. })
    ));
}
