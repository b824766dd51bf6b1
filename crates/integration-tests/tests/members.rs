//! Member administration: roles, activation and deletion.

use amicale_admin::{AdminError, Tab};
use amicale_core::ProfileRole;
use amicale_integration_tests::{PASSWORD, World};
use secrecy::SecretString;

fn yes(_: &str) -> bool {
    true
}

#[tokio::test]
async fn test_promotion_opens_new_tabs() {
    let world = World::new().await;
    let (author, author_email) = world.register("redacteur", ProfileRole::Author);
    world.signed_in_as("president", ProfileRole::Admin).await;

    let mut users = world.console().users().unwrap();
    users.load().await.unwrap();
    users.set_role(author, ProfileRole::Editor).await.unwrap();

    assert_eq!(users.notice(), Some("Role changed to editor."));
    assert!(
        users
            .users()
            .iter()
            .any(|p| p.id == author && p.role == ProfileRole::Editor)
    );

    world.sign_out().await;
    world.sign_in(&author_email).await;
    let tabs = world.console().available_tabs();
    assert!(tabs.contains(&Tab::Representatives));
    assert!(!tabs.contains(&Tab::Users));
}

#[tokio::test]
async fn test_failed_role_change_is_reverted() {
    let world = World::new().await;
    let (member, _) = world.register("adherent", ProfileRole::Subscriber);
    world.signed_in_as("president", ProfileRole::Admin).await;
    let mut users = world.console().users().unwrap();
    users.load().await.unwrap();
    world.store.fail_writes("profiles", "row level security");

    let result = users.set_role(member, ProfileRole::Admin).await;

    assert!(matches!(result, Err(AdminError::Store(_))));
    let shown = users.users().iter().find(|p| p.id == member).unwrap();
    assert_eq!(shown.role, ProfileRole::Subscriber);
}

#[tokio::test]
async fn test_deactivate_member() {
    let world = World::new().await;
    let (member, _) = world.register("adherent", ProfileRole::Subscriber);
    world.signed_in_as("president", ProfileRole::Admin).await;
    let mut users = world.console().users().unwrap();
    users.load().await.unwrap();

    users.set_active(member, false).await.unwrap();

    assert_eq!(users.notice(), Some("Member deactivated."));
    let row = world
        .store
        .rows("profiles")
        .into_iter()
        .find(|r| r["id"] == member.to_string())
        .unwrap();
    assert_eq!(row["active"], false);
}

#[tokio::test]
async fn test_deleted_member_cannot_sign_in() {
    let world = World::new().await;
    let (member, member_email) = world.register("ancien", ProfileRole::Subscriber);
    world.signed_in_as("president", ProfileRole::Admin).await;
    let mut users = world.console().users().unwrap();
    users.load().await.unwrap();

    users.delete(member, &yes).await.unwrap();

    assert!(!world.store.has_identity(member));
    assert!(users.users().iter().all(|p| p.id != member));

    world.sign_out().await;
    let result = world
        .state
        .gate()
        .sign_in(&member_email, &SecretString::from(PASSWORD.to_owned()))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_editor_cannot_manage_members() {
    let world = World::new().await;
    world.signed_in_as("secretaire", ProfileRole::Editor).await;

    assert!(matches!(
        world.console().users(),
        Err(AdminError::Forbidden(Tab::Users))
    ));
}
