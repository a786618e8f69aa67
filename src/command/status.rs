use anyhow::Result;

use crate::config::Settings;
use crate::provision::assistant_params_hash;
use crate::state::{
    FileStateStore, StateScope, StateStore, ASSISTANT_ID_LOG_KEY, THREAD_ID_KEY,
    VECTOR_STORE_FILE_BATCH_ID_KEY, VECTOR_STORE_FILE_BATCH_STATUS_KEY, VECTOR_STORE_ID_KEY,
};

fn or_none(value: Option<String>) -> String {
    value.unwrap_or_else(|| "(none)".to_string())
}

pub fn run_status(settings: Settings, change_id: Option<&str>) -> Result<()> {
    settings.validate()?;
    let store = FileStateStore::new(settings.state_dir.clone());
    let project = StateScope::Project(settings.project_name.clone());
    let workspace = StateScope::Workspace(settings.project_name.clone());

    println!("📁 Project {} ({})", settings.project_name, settings.project_root.display());
    println!("   State directory: {}", store.root().display());

    let vector_store = store.get(&project, VECTOR_STORE_ID_KEY)?;
    match &vector_store {
        Some(id) => {
            println!("✅ Vector store: {}", id);
            println!(
                "   File batch: {} ({})",
                or_none(store.get(&project, VECTOR_STORE_FILE_BATCH_ID_KEY)?),
                or_none(store.get(&project, VECTOR_STORE_FILE_BATCH_STATUS_KEY)?)
            );
        }
        None => println!("❌ No vector store yet"),
    }

    let hash = assistant_params_hash(&settings.assistant);
    match store.get(&workspace, &hash)? {
        Some(id) => println!("✅ Assistant for {}: {}", settings.assistant.model, id),
        None => println!(
            "❌ No assistant cached for the current parameters ({})",
            settings.assistant.model
        ),
    }

    if let Some(change_id) = change_id {
        let change = StateScope::Change(change_id.to_string());
        println!("\n🔀 Change {}", change_id);
        println!("   Thread: {}", or_none(store.get(&change, THREAD_ID_KEY)?));
        let log = store.get_list(&change, ASSISTANT_ID_LOG_KEY)?;
        if log.is_empty() {
            println!("   No assistants used yet");
        } else {
            println!("   Assistants used:");
            for entry in log {
                println!("     {}", entry);
            }
        }
    }

    Ok(())
}
