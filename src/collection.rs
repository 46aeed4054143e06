use crate::karakeep::BookmarkService;
use eyre::{Context, Result};

/// Identifies the Karakeep list that synced chats live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub id: String,
    pub name: String,
}

/// Find the list called `name`, creating it when it does not exist yet.
///
/// When several lists share the name, the first one the API returns is used.
pub fn resolve<S: BookmarkService>(service: &S, name: &str) -> Result<CollectionHandle> {
    let lists = service
        .list_collections()
        .wrap_err("Failed to list Karakeep lists")?;

    let mut matching = lists.into_iter().filter(|l| l.name == name);
    if let Some(found) = matching.next() {
        let others = matching.count();
        if others > 0 {
            tracing::debug!(list = name, others, "several lists share this name, using the first");
        }
        tracing::info!(list = name, id = %found.id, "found Karakeep list");
        return Ok(CollectionHandle {
            id: found.id,
            name: found.name,
        });
    }

    tracing::info!(list = name, "Karakeep list not found, creating it");
    let id = service
        .create_collection(name)
        .wrap_err_with(|| format!("Failed to create Karakeep list {:?}", name))?;
    tracing::info!(list = name, id = %id, "created Karakeep list");
    Ok(CollectionHandle {
        id,
        name: name.to_string(),
    })
}
