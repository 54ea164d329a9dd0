//! Basic usage example - import product relations from CSV-like rows

use listsync_core::{
    FieldMapping, ImportRun, ListProcessor, ListProcessorConfig, ListSearch, ListStore,
    ParentItem, Processor, RawRow, Result, SqliteStore,
};

fn main() -> Result<()> {
    // Get path from args or use an in-memory store
    let store = match std::env::args().nth(1) {
        Some(path) => SqliteStore::open_at(path.as_ref(), "product")?,
        None => SqliteStore::open_in_memory("product")?,
    };

    store.register_type("product", "default", "Standard")?;
    store.register_type("product", "suggestion", "Suggestion")?;
    for code in ["U:TEST", "CNC", "CNE"] {
        store.insert_entity("product", code, code)?;
    }

    let processor = ListProcessor::from_store(
        ListProcessorConfig::new("product", "product"),
        FieldMapping::consecutive(
            2,
            ["product.code", "product.list.type", "product.code", "product.list.type"],
        ),
        &store,
    );

    let Some(parent_id) = store.entity_id("product", "U:TEST")? else {
        println!("Parent product is missing.");
        return Ok(());
    };
    let parent = ParentItem::new(parent_id, "U:TEST");

    let row: RawRow = [
        (0, "U:TEST"),
        (1, "Test product"),
        (2, "CNC"),
        (3, "default"),
        (4, "CNE"),
        (5, "suggestion"),
    ]
    .into_iter()
    .map(|(pos, value)| (pos, value.to_string()))
    .collect();

    let mut run = ImportRun::new();
    let remaining = processor.process(&mut run, &parent, row)?;
    println!("Unconsumed columns: {:?}", remaining);

    for item in store.search(&ListSearch::new().parent(parent.id))? {
        println!(
            "  - {} {} at {}",
            item.type_code().unwrap_or("?"),
            item.ref_code().unwrap_or("?"),
            item.position()
        );
    }

    Ok(())
}
