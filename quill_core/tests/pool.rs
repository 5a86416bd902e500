use quill_core::db::{self, ConnectionMethods};
use quill_core::migrations;
use quill_test_helper::*;

#[test]
fn r2d2_sqlite() {
    let (spec, _dir) = sqlite_file_connspec();
    let manager = db::ConnectionManager::new(spec);
    let pool = r2d2::Pool::builder().max_size(3).build(manager).unwrap();

    {
        let conn1 = pool.get().unwrap();
        assert_eq!(pool.state().connections, 3);
        assert_eq!(pool.state().idle_connections, 2);
        migrations::migrate(&*conn1).unwrap();
        create_user(&conn1, "alice", false);

        let conn2 = pool.get().unwrap();
        assert_eq!(pool.state().idle_connections, 1);
        assert!(conn2.find_user_by_username("alice").unwrap().is_some());
    }
    assert_eq!(pool.state().idle_connections, 3);
}

#[test]
fn r2d2_sqlite_memory_connections_are_separate() {
    let manager = db::ConnectionManager::new(sqlite_connspec());
    let pool = r2d2::Pool::builder().max_size(2).build(manager).unwrap();
    let conn1 = pool.get().unwrap();
    let conn2 = pool.get().unwrap();
    migrations::migrate(&*conn1).unwrap();
    migrations::migrate(&*conn2).unwrap();
    create_user(&conn1, "alice", false);
    assert!(conn1.find_user_by_username("alice").unwrap().is_some());
    assert!(conn2.find_user_by_username("alice").unwrap().is_none());
}

#[test]
fn r2d2_docstore_shares_named_store() {
    let manager = db::ConnectionManager::new(docstore_connspec());
    let pool = r2d2::Pool::builder().max_size(2).build(manager).unwrap();
    let conn1 = pool.get().unwrap();
    let conn2 = pool.get().unwrap();
    let tag = conn1.insert_tag("shared").unwrap();
    assert_eq!(conn2.get_tag(tag.id).unwrap(), Some(tag));
}
