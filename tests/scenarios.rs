use anyhow::Context;
use quote_revisions::{
    Actor, DocumentError, DocumentSession, NewDocument, SledGateway,
    actor::CurrentUser,
    config::Config,
    gateway::DocumentGateway,
    lifecycle::DisplayState,
};
use serde_json::json;
use tempfile::{TempDir, tempdir}; // Use for test db cleanup.

/// Each test gets its own database; sled locks the directory it opens.
fn open_session(name: &str) -> anyhow::Result<(TempDir, DocumentSession<SledGateway>)> {
    let temp_dir = tempdir()?;
    let config = Config::default().with_db_path(temp_dir.path().join(name));
    let gateway = SledGateway::open(config)?;
    Ok((temp_dir, DocumentSession::new(gateway)))
}

fn pump_quote() -> NewDocument {
    NewDocument::new(json!({
        "selectedClient": {"id": 3, "name": "Harbour Works"},
        "paymentTerms": "30 days",
        "addedProducts": [{
            "id": 1,
            "name": "Pump",
            "price": 1000,
            "discount": 0,
            "components": [{
                "id": "c1",
                "name": "Seal",
                "price": 50,
                "quantity": 1,
                "included": true,
                "discount": 0
            }]
        }]
    }))
}

#[test]
fn discount_edit_is_logged_then_saved() -> anyhow::Result<()> {
    let (_dir, mut session) = open_session("discount_edit.db")?;
    let created = session.create_document(pump_quote())?;
    session
        .get_document(&created.hash)
        .context("Fetch failed: ")?;

    session.update_nested_document_field(&["data", "addedProducts", "0", "discount"], json!(10))?;

    let logs = session.change_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].property(), "data.addedProducts[0].discount");
    assert_eq!(logs[0].original_value, json!(0));
    assert_eq!(logs[0].new_value, json!(10));
    assert!(logs[0].action.contains("Pump"));

    // an empty label saves without capturing a revision
    let saved = session.save_document(Some(&Actor::employee(7)), "")?;
    assert!(saved.revisions.is_empty());
    assert!(session.change_logs().is_empty());

    let discount = session
        .original()
        .map(|doc| doc.data["addedProducts"][0]["discount"].clone());
    assert_eq!(discount, Some(json!(10)));
    Ok(())
}

#[test]
fn employee_and_client_take_turns() -> anyhow::Result<()> {
    let (_dir, mut session) = open_session("turns.db")?;
    let created = session.create_document(pump_quote())?;
    session.get_document(&created.hash)?;

    let employee = session
        .resolve_actor(Some(&CurrentUser::employee(7)))
        .context("employee should resolve")?;

    session.update_document_field("data.paymentTerms", json!("14 days"))?;
    let saved = session.save_document(Some(&employee), "Shorter terms")?;
    assert_eq!(saved.status.display_state(), DisplayState::YourTurn);
    assert_eq!(saved.revisions.len(), 1);

    // the client opens the link with the passcode
    let otp = created.otp.clone();
    session.unlock_with_otp(&created.hash, &otp)?;
    let client = session.resolve_actor(None).context("client should resolve")?;
    assert_eq!(client, Actor::client(3));

    session.update_document_field("data.addedProducts[0].components[0].quantity", json!(2))?;
    let saved = session.save_document(Some(&client), "More seals")?;
    assert!(!saved.status.your_turn);
    assert!(saved.status.client_viewed);
    assert_eq!(saved.status.display_state(), DisplayState::ClientViewed);

    // history is ordered and each entry keeps its own changes
    assert_eq!(saved.revisions.len(), 2);
    assert_eq!(saved.revisions[0].actor(), &employee);
    assert_eq!(saved.revisions[1].actor(), &client);
    assert_eq!(
        saved.revisions[1].changes()[0].property(),
        "data.addedProducts[0].components[0].quantity"
    );
    Ok(())
}

#[test]
fn confirmed_quote_is_read_only() -> anyhow::Result<()> {
    let (_dir, mut session) = open_session("confirm.db")?;
    let created = session.create_document(pump_quote())?;
    session.get_document(&created.hash)?;
    let client = Actor::client(3);

    let confirmed = session.confirm_document(Some(&client))?;
    assert_eq!(confirmed.status.display_state(), DisplayState::Finalized);
    assert!(confirmed.date_of_signature.is_some());
    assert!(confirmed.pdf_urls[0].url.ends_with("confirmation-1.pdf"));

    assert!(matches!(
        session.update_document_field("data.paymentTerms", json!("never")),
        Err(DocumentError::ReadOnly(DisplayState::Finalized))
    ));
    assert!(session.change_logs().is_empty());
    Ok(())
}

#[test]
fn rejected_quote_refuses_every_mutation() -> anyhow::Result<()> {
    let (_dir, mut session) = open_session("reject.db")?;
    let created = session.create_document(pump_quote())?;
    session.get_document(&created.hash)?;
    let client = Actor::client(3);

    session.reject_document(Some(&client))?;
    let before = session.working().cloned();

    assert!(session.update_document_field("note", json!("please")).is_err());
    assert!(session.save_document(Some(&client), "late").is_err());
    assert!(session.confirm_document(Some(&client)).is_err());
    assert!(session.reject_document(Some(&client)).is_err());
    assert!(session.create_revision(Some(&client), None, false).is_err());

    assert_eq!(session.working().cloned(), before);
    Ok(())
}

#[test]
fn nobody_resolved_means_read_only() -> anyhow::Result<()> {
    let (_dir, mut session) = open_session("anonymous.db")?;
    let created = session.create_document(pump_quote())?;
    session.get_document(&created.hash)?;

    // without the passcode the selected client does not count
    let actor = session.resolve_actor(None);
    assert_eq!(actor, None);

    session.update_document_field("note", json!("draft"))?;
    assert!(matches!(
        session.save_document(actor.as_ref(), ""),
        Err(DocumentError::Unauthorized)
    ));
    assert_eq!(session.change_logs().len(), 1);

    // the local edit never reached the database
    let stored = session.gateway().fetch_document(&created.hash)?;
    assert_eq!(stored.note, created.note);
    Ok(())
}

#[test]
fn documents_list_and_delete() -> anyhow::Result<()> {
    let (_dir, mut session) = open_session("listing.db")?;
    let first = session.create_document(pump_quote())?;
    let second = session.create_document(NewDocument::new(json!({"paymentTerms": "cash"})))?;

    let all = session.get_all_documents()?;
    assert_eq!(all.len(), 2);
    assert_ne!(first.hash, second.hash);

    assert_eq!(session.delete_documents(&[first.id])?, 1);
    assert!(matches!(
        session.get_document(&first.hash),
        Err(DocumentError::Fetch(_))
    ));
    assert_eq!(session.get_all_documents()?.len(), 1);
    Ok(())
}
