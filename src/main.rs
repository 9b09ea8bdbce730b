use anyhow::{Context, bail};
use log::info;
use pagestore::file::{FileManager, PAGE_SIZE, PageStore};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: pagestore <path>");
    };

    let store = FileManager::open(&path).with_context(|| format!("Failed to open {path}"))?;
    let id = store.allocate_page().context("Failed to allocate a page")?;

    let mut data = vec![0u8; PAGE_SIZE];
    let marker = format!("written to {id}");
    data[..marker.len()].copy_from_slice(marker.as_bytes());
    store
        .write_page(id, &data)
        .with_context(|| format!("Failed to write {id}"))?;

    let mut buf = vec![0u8; PAGE_SIZE];
    store
        .read_page(id, &mut buf)
        .with_context(|| format!("Failed to read {id}"))?;
    if buf != data {
        bail!("{id} read back different content than was written");
    }
    info!("Verified {} in {}", id, path);

    println!(
        "{}: {} write(s), {} bytes",
        store.path().display(),
        store.write_count(),
        store.size()
    );
    store.shutdown().context("Failed to shut down the page store")?;
    Ok(())
}
