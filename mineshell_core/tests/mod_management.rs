use mineshell_core::{
    models::{InstanceConfig, InstanceRegistry, InstanceSummary, ModEntry},
    ModSource, ModType, Modloader,
};

fn saved_instance(root: &std::path::Path) -> InstanceConfig {
    let mut instance = InstanceConfig::new("Sky Block", "1.20.1", Modloader::Fabric, root);
    std::fs::create_dir_all(instance.dir_for(ModType::Mod)).unwrap();
    std::fs::create_dir_all(instance.dir_for(ModType::Datapack)).unwrap();
    std::fs::write(instance.dir_for(ModType::Mod).join("sodium.jar"), b"jar").unwrap();
    std::fs::write(instance.dir_for(ModType::Datapack).join("towers.zip"), b"zip").unwrap();

    instance
        .mods
        .add(ModEntry::from_override("sodium.jar", ModType::Mod, ModSource::Modrinth));
    instance
        .mods
        .add(ModEntry::from_override("towers.zip", ModType::Datapack, ModSource::Modrinth));
    instance.save().unwrap();
    instance
}

#[test]
fn toggling_renames_the_file_and_persists_the_flag() {
    let tmp = tempfile::tempdir().unwrap();
    let mut instance = saved_instance(tmp.path());
    let mods_dir = instance.dir_for(ModType::Mod);

    assert!(instance.mods.toggle("sodium.jar", &instance.path));
    assert!(mods_dir.join("sodium.jar.disabled").exists());
    assert!(!mods_dir.join("sodium.jar").exists());
    instance.save_mods().unwrap();

    let mut loaded = InstanceConfig::load(&instance.path).unwrap();
    let entry = loaded.mods.get("sodium.jar").unwrap();
    assert!(!entry.enabled);
    assert_eq!(entry.filename, "sodium.jar.disabled");

    // disabling twice is a no-op
    assert!(loaded.mods.disable("sodium.jar", &instance.path));
    assert!(loaded.mods.enable("sodium.jar", &instance.path));
    assert!(mods_dir.join("sodium.jar").exists());
    assert!(loaded.mods.get("sodium.jar").unwrap().enabled);
}

#[test]
fn datapacks_toggle_inside_the_world_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let mut instance = saved_instance(tmp.path());
    let datapacks = instance.dir_for(ModType::Datapack);

    assert!(instance.mods.disable("towers.zip", &instance.path));
    assert!(datapacks.join("towers.zip.disabled").exists());
}

#[test]
fn toggle_fails_when_the_file_is_missing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut instance = saved_instance(tmp.path());
    std::fs::remove_file(instance.dir_for(ModType::Mod).join("sodium.jar")).unwrap();

    assert!(!instance.mods.toggle("sodium.jar", &instance.path));
    assert!(instance.mods.get("sodium.jar").unwrap().enabled);
    assert!(!instance.mods.toggle("unknown", &instance.path));
}

#[test]
fn removal_deletes_the_file_from_its_type_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let mut instance = saved_instance(tmp.path());

    assert!(instance.mods.remove("towers.zip", &instance.path));
    assert!(!instance.dir_for(ModType::Datapack).join("towers.zip").exists());
    assert!(!instance.mods.contains("towers.zip"));

    // a file that is already gone does not block removal
    std::fs::remove_file(instance.dir_for(ModType::Mod).join("sodium.jar")).unwrap();
    assert!(instance.mods.remove("sodium.jar", &instance.path));
    assert!(instance.mods.mods.is_empty());
    assert!(!instance.mods.remove("sodium.jar", &instance.path));
}

#[test]
fn removal_keeps_the_entry_when_the_file_cannot_be_deleted() {
    let tmp = tempfile::tempdir().unwrap();
    let mut instance = saved_instance(tmp.path());

    // a non-empty directory in place of the jar makes the delete fail
    let jar = instance.dir_for(ModType::Mod).join("sodium.jar");
    std::fs::remove_file(&jar).unwrap();
    std::fs::create_dir_all(&jar).unwrap();
    std::fs::write(jar.join("inner.class"), b"x").unwrap();

    assert!(!instance.mods.remove("sodium.jar", &instance.path));
    assert!(instance.mods.contains("sodium.jar"));
    assert_eq!(instance.mods.mods.len(), 2);
    assert!(jar.join("inner.class").exists());
}

#[test]
fn registry_tracks_installed_instances() {
    let tmp = tempfile::tempdir().unwrap();
    let instance = saved_instance(tmp.path());

    let mut registry = InstanceRegistry::load(tmp.path()).unwrap();
    assert!(registry.instances.is_empty());
    assert!(registry.add_instance(InstanceSummary::from(&instance)));
    assert!(!registry.add_instance(InstanceSummary::from(&instance)));
    registry
        .set_default_instance(&instance.instance_id, tmp.path())
        .unwrap();

    let registry = InstanceRegistry::load(tmp.path()).unwrap();
    assert!(registry.last_updated.is_some());
    assert_eq!(registry.default_instance.as_deref(), Some("Sky_Block"));
    let default = registry.get_default_instance().unwrap().unwrap();
    assert_eq!(default.name, "Sky Block");
    assert_eq!(default.mods.mods.len(), 2);
}
