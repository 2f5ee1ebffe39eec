use claimsdb_core::config::EmbeddingSettings;
use claimsdb_embed::get_default_embedder;

fn main() -> anyhow::Result<()> {
    let embedder = get_default_embedder(&EmbeddingSettings::default())?;
    let texts = vec!["pending dental claims".to_string(), "Claim Type: Vision\nStatus: Rejected".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("B={} dim={} id={}", embs.len(), embedder.dim(), embedder.embedder_id());
    Ok(())
}
