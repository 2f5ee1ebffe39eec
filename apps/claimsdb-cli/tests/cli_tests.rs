use std::fs;

use claimsdb_cli::load_settings;

#[test]
fn relative_model_dir_resolves_against_config_dir() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("config.toml"), "[retrieval]\ntop_k = 4\n\n[embedding]\nmodel_dir = \"models/minilm\"\n")?;
    let settings = load_settings(dir.path())?;
    assert_eq!(settings.retrieval.top_k, 4);
    assert_eq!(settings.embedding.model_dir, dir.path().join("models/minilm").to_string_lossy());
    Ok(())
}

#[test]
fn absolute_model_dir_is_kept() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let models = tempfile::tempdir()?;
    fs::write(dir.path().join("config.toml"), format!("[embedding]\nmodel_dir = \"{}\"\n", models.path().display()))?;
    let settings = load_settings(dir.path())?;
    assert_eq!(settings.embedding.model_dir, models.path().to_string_lossy());
    Ok(())
}

#[test]
fn invalid_config_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("config.toml"), "[retrieval]\ndistance_threshold = -1.0\n")?;
    assert!(load_settings(dir.path()).is_err());
    Ok(())
}
