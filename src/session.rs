//! Session API for working on one open document
use crate::actor::{Actor, CurrentUser, determine_actor};
use crate::diff::ChangeLogItem;
use crate::document::{Document, NewDocument};
use crate::error::{DocumentError, GatewayError};
use crate::gateway::{DocumentGateway, RevisionLabel, SaveRequest};
use crate::lifecycle::Transition;
use crate::path::{Path, Segment};
use crate::pricing::{Product, Totals};
use crate::revision::{self, Revision};
use crate::store::DocumentStore;
use crate::types::ArtifactKind;
use serde_json::Value;
use tracing::{debug, info, warn};

pub type Listener = Box<dyn FnMut(&[ChangeLogItem])>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Holds the original/working pair of the open document, keeps the live
/// change list current and routes lifecycle actions through the gateway.
///
/// One save at a time: callers must not start a second save before the first
/// returns.
pub struct DocumentSession<G: DocumentGateway> {
    gateway: G,
    store: Option<DocumentStore>,
    change_logs: Vec<ChangeLogItem>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: usize,
    on_unauthorized: Option<Box<dyn Fn()>>,
    client_unlocked: bool,
    viewed_marked: bool,
}

impl<G: DocumentGateway> DocumentSession<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            store: None,
            change_logs: vec![],
            listeners: vec![],
            next_subscription: 0,
            on_unauthorized: None,
            client_unlocked: false,
            viewed_marked: false,
        }
    }

    /// Called whenever the gateway answers `Unauthorized`, e.g. to send the
    /// user back to a sign-in page.
    pub fn with_unauthorized_handler(mut self, handler: impl Fn() + 'static) -> Self {
        self.on_unauthorized = Some(Box::new(handler));
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn original(&self) -> Option<&Document> {
        self.store.as_ref().map(DocumentStore::original)
    }

    pub fn working(&self) -> Option<&Document> {
        self.store.as_ref().map(DocumentStore::working)
    }

    /// The live diff between original and working copy.
    pub fn change_logs(&self) -> &[ChangeLogItem] {
        &self.change_logs
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&[ChangeLogItem]) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn loaded(&self) -> Result<&DocumentStore, DocumentError> {
        self.store.as_ref().ok_or(DocumentError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut DocumentStore, DocumentError> {
        self.store.as_mut().ok_or(DocumentError::NotLoaded)
    }

    fn loaded_document(&self) -> Result<&Document, DocumentError> {
        Ok(self.loaded()?.working())
    }

    fn ensure_allows(&self, transition: Transition) -> Result<(), DocumentError> {
        self.loaded()?.original().status.ensure_allows(transition)
    }

    fn recompute(&mut self) {
        self.change_logs = self
            .store
            .as_ref()
            .map(DocumentStore::changes)
            .unwrap_or_default();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.change_logs);
        }
    }

    fn load(&mut self, document: Document) {
        let reopened = self
            .store
            .as_ref()
            .is_some_and(|store| store.original().hash == document.hash);
        if !reopened {
            self.client_unlocked = false;
            self.viewed_marked = false;
        }
        match self.store.as_mut() {
            Some(store) if reopened => store.commit(document),
            _ => self.store = Some(DocumentStore::new(document)),
        }
        self.recompute();
    }

    fn notice(&self, err: &GatewayError) {
        if matches!(err, GatewayError::Unauthorized) {
            if let Some(handler) = &self.on_unauthorized {
                handler();
            }
        }
    }

    // CRUD

    pub fn get_document(&mut self, hash: &str) -> Result<&Document, DocumentError> {
        let document = self.gateway.fetch_document(hash).map_err(|err| {
            self.notice(&err);
            warn!(hash, error = %err, "fetch failed");
            DocumentError::fetch(err)
        })?;
        debug!(hash, revisions = document.revisions.len(), "document loaded");
        self.load(document);
        self.loaded_document()
    }

    pub fn get_all_documents(&self) -> Result<Vec<Document>, DocumentError> {
        self.gateway.list_documents().map_err(|err| {
            self.notice(&err);
            DocumentError::fetch(err)
        })
    }

    pub fn create_document(&self, draft: NewDocument) -> Result<Document, DocumentError> {
        self.gateway.create_document(draft).map_err(|err| {
            self.notice(&err);
            DocumentError::gateway(err)
        })
    }

    /// Delete by id. Closes the open document if it was one of them.
    pub fn delete_documents(&mut self, ids: &[u64]) -> Result<usize, DocumentError> {
        let removed = self.gateway.delete_documents(ids).map_err(|err| {
            self.notice(&err);
            DocumentError::gateway(err)
        })?;
        if self
            .store
            .as_ref()
            .is_some_and(|store| ids.contains(&store.original().id))
        {
            self.store = None;
            self.recompute();
        }
        Ok(removed)
    }

    // Mutation

    pub fn set_field(&mut self, path: &Path, value: Value) -> Result<(), DocumentError> {
        self.ensure_allows(Transition::Edit)?;
        self.loaded_mut()?.set_field(path, value)?;
        debug!(path = %path, "field updated");
        self.recompute();
        Ok(())
    }

    /// `path` in `data.addedProducts[0].discount` form.
    pub fn update_document_field(&mut self, path: &str, value: Value) -> Result<(), DocumentError> {
        let path = Path::parse(path)?;
        self.set_field(&path, value)
    }

    /// `path` as separate parts, `["data", "addedProducts", "0", "discount"]`.
    pub fn update_nested_document_field<S: AsRef<str>>(
        &mut self,
        path: &[S],
        value: Value,
    ) -> Result<(), DocumentError> {
        let path = Path::from_parts(path)?;
        self.set_field(&path, value)
    }

    pub fn reset_to_original(&mut self) -> Result<(), DocumentError> {
        self.loaded_mut()?.reset_to_original();
        self.recompute();
        Ok(())
    }

    // Revisions

    /// Capture the working copy as a revision and append it to the working
    /// history; the next save carries it to the server.
    pub fn create_revision(
        &mut self,
        actor: Option<&Actor>,
        label: Option<&str>,
        require_changes: bool,
    ) -> Result<Revision, DocumentError> {
        let actor = actor.ok_or(DocumentError::Unauthorized)?;
        self.ensure_allows(Transition::Save)?;

        let store = self.loaded_mut()?;
        let revision = revision::create_revision(store, actor, label, require_changes)?;
        store.push_revision(revision.clone());

        info!(
            revision = revision.id(),
            changes = revision.changes().len(),
            at = ?revision.timestamp(),
            "revision captured"
        );
        Ok(revision)
    }

    pub fn select_revision(&self, id: u32) -> Result<&Revision, DocumentError> {
        revision::select_revision(self.loaded_document()?, id)
    }

    /// The change list frozen into a revision when it was captured.
    pub fn revision_changes(&self, id: u32) -> Result<&[ChangeLogItem], DocumentError> {
        Ok(self.select_revision(id)?.changes())
    }

    /// Load a revision's snapshot into the working copy. The revision itself
    /// is untouched.
    pub fn update_document_data_from_revision(
        &mut self,
        revision: &Revision,
    ) -> Result<(), DocumentError> {
        self.ensure_allows(Transition::Edit)?;
        revision::apply_revision(self.loaded_mut()?, revision)?;
        debug!(
            revision = revision.id(),
            digest = revision.digest(),
            "working copy loaded from revision"
        );
        self.recompute();
        Ok(())
    }

    // Lifecycle

    /// Resolve the actor for this viewer. The selected client only counts once
    /// the passcode was entered in this session.
    pub fn resolve_actor(&self, current_user: Option<&CurrentUser>) -> Option<Actor> {
        let client = self
            .working()
            .filter(|_| self.client_unlocked)
            .and_then(Document::selected_client);
        determine_actor(current_user, client.as_ref())
    }

    /// Persist the working copy. A non-empty `revision_label` also captures a
    /// revision when there is something to capture. On failure nothing local
    /// changes.
    pub fn save_document(
        &mut self,
        actor: Option<&Actor>,
        revision_label: &str,
    ) -> Result<&Document, DocumentError> {
        let actor = *actor.ok_or(DocumentError::Unauthorized)?;
        self.ensure_allows(Transition::Save)?;

        let store = self.loaded()?;
        let changes = store.changes();
        if !actor.is_employee()
            && changes.iter().any(|item| item.path.first_key() == Some("note"))
        {
            return Err(DocumentError::Forbidden("the note is employee-only".into()));
        }

        let mut outgoing = store.working().clone();
        let label = revision_label.trim();
        if !label.is_empty() && !changes.is_empty() {
            let revision = revision::create_revision(store, &actor, Some(label), true)?;
            outgoing.revisions.push(revision);
        }

        let hash = outgoing.hash.clone();
        let request = SaveRequest {
            document: outgoing,
            actor,
            revision: RevisionLabel {
                label: label.to_owned(),
            },
        };

        let saved = self
            .gateway
            .persist_document(&hash, &request)
            .map_err(|err| {
                self.notice(&err);
                warn!(hash = %hash, error = %err, "save failed, keeping local edits");
                DocumentError::save(err)
            })?;

        info!(hash = %hash, changes = changes.len(), label, "document saved");
        self.loaded_mut()?.commit(saved);
        self.recompute();
        self.loaded_document()
    }

    /// Confirm the quote. The server finalizes it while generating the
    /// confirmation PDF; the refetched document carries the new status.
    pub fn confirm_document(&mut self, actor: Option<&Actor>) -> Result<&Document, DocumentError> {
        actor.ok_or(DocumentError::Unauthorized)?;
        self.ensure_allows(Transition::Confirm)?;
        let hash = self.loaded()?.original().hash.clone();

        self.gateway
            .confirm_document(&hash)
            .and_then(|_| {
                self.gateway
                    .generate_artifact(&hash, ArtifactKind::Confirmation)
            })
            .map_err(|err| {
                self.notice(&err);
                warn!(hash = %hash, error = %err, "confirmation failed");
                DocumentError::gateway(err)
            })?;

        info!(hash = %hash, "document confirmed");
        self.get_document(&hash)
    }

    pub fn reject_document(&mut self, actor: Option<&Actor>) -> Result<&Document, DocumentError> {
        actor.ok_or(DocumentError::Unauthorized)?;
        self.ensure_allows(Transition::Reject)?;
        let hash = self.loaded()?.original().hash.clone();

        let rejected = self.gateway.reject_document(&hash).map_err(|err| {
            self.notice(&err);
            DocumentError::gateway(err)
        })?;

        info!(hash = %hash, "document rejected");
        self.load(rejected);
        self.loaded_document()
    }

    /// Regenerate the default PDF for the open document.
    pub fn generate_pdf(&mut self, actor: Option<&Actor>) -> Result<&Document, DocumentError> {
        actor.ok_or(DocumentError::Unauthorized)?;
        self.ensure_allows(Transition::GenerateArtifact)?;
        let hash = self.loaded()?.original().hash.clone();

        self.gateway
            .generate_artifact(&hash, ArtifactKind::Default)
            .map_err(|err| {
                self.notice(&err);
                DocumentError::gateway(err)
            })?;
        self.get_document(&hash)
    }

    /// Record that the client has seen the document. Only the first call per
    /// unlocked session reaches the gateway.
    pub fn client_viewed_document(&mut self, hash: &str) -> Result<(), DocumentError> {
        let same_document = self
            .original()
            .is_some_and(|document| document.hash == hash);
        if same_document {
            if self.viewed_marked {
                return Ok(());
            }
            self.ensure_allows(Transition::ClientViewed)?;
        }

        self.gateway.mark_client_viewed(hash).map_err(|err| {
            self.notice(&err);
            DocumentError::gateway(err)
        })?;

        if same_document {
            self.loaded_mut()?.mark_client_viewed();
            self.viewed_marked = true;
        }
        debug!(hash, "client view recorded");
        Ok(())
    }

    /// Open a document as its client, checking the passcode and expiry.
    pub fn unlock_with_otp(&mut self, hash: &str, otp: &str) -> Result<&Document, DocumentError> {
        let document = self.gateway.fetch_document(hash).map_err(|err| {
            self.notice(&err);
            DocumentError::fetch(err)
        })?;
        if document.otp.is_empty() || document.otp != otp.trim() {
            warn!(hash, "passcode mismatch");
            return Err(DocumentError::InvalidOtp);
        }
        if document.is_expired() {
            return Err(DocumentError::Expired);
        }

        self.load(document);
        self.client_unlocked = true;
        if !self.loaded()?.original().status.rejected {
            self.client_viewed_document(hash)?;
        }
        self.loaded_document()
    }

    pub fn is_client_unlocked(&self) -> bool {
        self.client_unlocked
    }

    // Products

    fn products_path() -> Path {
        Path::from_segments(vec![
            Segment::Key("data".into()),
            Segment::Key("addedProducts".into()),
        ])
    }

    fn products_value(&self) -> Result<Vec<Value>, DocumentError> {
        let working = self.loaded_document()?;
        match working.data.get("addedProducts") {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Ok(vec![]),
        }
    }

    /// Copy a catalog product into the quote. Later catalog edits do not
    /// reach the copy.
    pub fn add_product(&mut self, product: &Product) -> Result<(), DocumentError> {
        let snapshot = serde_json::to_value(product.snapshot())
            .map_err(|err| DocumentError::InvalidField(err.to_string()))?;
        let mut products = self.products_value()?;
        products.push(snapshot);
        self.set_field(&Self::products_path(), Value::Array(products))
    }

    pub fn remove_product(&mut self, index: usize) -> Result<(), DocumentError> {
        let mut products = self.products_value()?;
        if index >= products.len() {
            return Err(DocumentError::ProductNotFound(index));
        }
        products.remove(index);
        self.set_field(&Self::products_path(), Value::Array(products))
    }

    fn components_of(&self, product: usize) -> Result<(Path, Vec<Value>), DocumentError> {
        let products = self.products_value()?;
        let item = products
            .get(product)
            .ok_or(DocumentError::ProductNotFound(product))?;
        let components = match item.get("components") {
            Some(Value::Array(components)) => components.clone(),
            _ => vec![],
        };
        let path = Self::products_path().child(product).child("components");
        Ok((path, components))
    }

    /// Swap a component with its neighbour. Moving past either end is a no-op.
    pub fn move_component(
        &mut self,
        product: usize,
        component: usize,
        direction: MoveDirection,
    ) -> Result<(), DocumentError> {
        let (path, mut components) = self.components_of(product)?;
        if component >= components.len() {
            return Err(DocumentError::ComponentNotFound { product, component });
        }
        let target = match direction {
            MoveDirection::Up => component.checked_sub(1),
            MoveDirection::Down => Some(component + 1).filter(|next| *next < components.len()),
        };
        let Some(target) = target else {
            return Ok(());
        };
        components.swap(component, target);
        self.set_field(&path, Value::Array(components))
    }

    /// Put components back in catalog order.
    pub fn sort_components_by_original_index(&mut self, product: usize) -> Result<(), DocumentError> {
        let (path, mut components) = self.components_of(product)?;
        components.sort_by_key(|component| {
            component
                .get("originalIndex")
                .and_then(Value::as_u64)
                .unwrap_or(u64::MAX)
        });
        self.set_field(&path, Value::Array(components))
    }

    pub fn totals(&self) -> Result<Totals, DocumentError> {
        self.loaded_document()?.totals()
    }
}
