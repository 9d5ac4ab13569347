//! Integration tests for whole-model import/export and animation sets.

use std::f32::consts::FRAC_PI_2;
use std::io::Cursor;

use glam::{Quat, Vec2, Vec3};

use eiasset::anm::{Animation, AnmOptions};
use eiasset::fig::{Figure, FULL_MORPH_COUNT};
use eiasset::lnk::LinkGraph;
use eiasset::model::{
    export_animation, export_model, import_animation, import_model, Bone, Model,
};
use eiasset::res::{Mode, ResFile};
use eiasset::xform::AnimationSet;

fn small_figure(name: &str, morph_count: usize) -> Figure {
    let mut fig = Figure {
        name: name.to_string(),
        morph_count,
        ..Figure::default()
    };
    fig.header.vertex_count = 1;
    fig.header.normal_count = 1;
    fig.header.texcoord_count = 2;
    fig.header.index_count = 3;
    fig.header.vertex_component_count = 1;
    fig.header.morph_component_count = 1;
    fig.header.group = 18;
    fig.header.texture_number = 8;
    for i in 0..FULL_MORPH_COUNT {
        fig.center.push(Vec3::splat(i as f32));
        fig.min.push(Vec3::splat(-1.0));
        fig.max.push(Vec3::splat(1.0));
        fig.radius.push(1.0);
    }
    for morph in 0..morph_count {
        fig.vertices
            .push((0..4).map(|v| Vec3::new(morph as f32, v as f32, 0.0)).collect());
    }
    fig.normals = vec![[0.0, 0.0, 1.0, 1.0]; 4];
    fig.uvs = vec![Vec2::new(0.25, 0.75), Vec2::new(0.5, 0.5)];
    fig.indices = vec![0, 1, 2];
    fig.vertex_components = vec![[0, 0, 0]];
    fig.morph_components = vec![[0, 0]];
    fig
}

fn chain_links() -> LinkGraph {
    let mut links = LinkGraph::new();
    links.add("base", None);
    links.add("arm", Some("base".to_string()));
    links.add("hand", Some("arm".to_string()));
    links
}

fn sample_model(name: &str) -> Model {
    Model {
        name: name.to_string(),
        links: chain_links(),
        figures: vec![
            small_figure("base", 8),
            small_figure("arm", 8),
            small_figure("hand", 8),
        ],
        bones: vec![
            Bone { name: "base".to_string(), positions: vec![Vec3::ZERO; 8] },
            Bone { name: "arm".to_string(), positions: vec![Vec3::X; 8] },
            Bone { name: "hand".to_string(), positions: vec![Vec3::Y; 8] },
        ],
    }
}

#[test]
fn test_model_roundtrip_nested() {
    // "unmods" matches the unit item group, morph component count 8,
    // which selects the nested .mod/.bon layout
    let model = sample_model("unmods");

    let mut cursor = Cursor::new(Vec::new());
    let mut archive = ResFile::new(&mut cursor, Mode::Write).expect("create");
    export_model(&mut archive, &model).expect("export");
    archive.close().expect("close");

    let mut archive =
        ResFile::new(Cursor::new(cursor.into_inner()), Mode::Read).expect("open");
    assert_eq!(archive.model_names(), vec!["unmods".to_string()]);

    let imported = import_model(&mut archive, "unmods", false).expect("import");
    assert_eq!(imported.links, model.links);
    assert_eq!(imported.figures.len(), 3);
    assert_eq!(imported.bones.len(), 3);
    // entries come back in hash-table order, so match parts up by name
    for want in &model.figures {
        let got = imported.figures.iter().find(|f| f.name == want.name).expect("figure");
        assert_eq!(got, want);
    }
    for want in &model.bones {
        let got = imported.bones.iter().find(|b| b.name == want.name).expect("bone");
        assert_eq!(got, want);
    }
}

#[test]
fn test_model_roundtrip_flat() {
    // quest items carry morph component count 1, the flat layout
    let mut model = sample_model("initqu01");
    for fig in &mut model.figures {
        fig.uvs = vec![Vec2::new(0.25, 0.5), Vec2::new(0.5, 1.0)];
    }

    let mut cursor = Cursor::new(Vec::new());
    let mut archive = ResFile::new(&mut cursor, Mode::Write).expect("create");
    export_model(&mut archive, &model).expect("export");
    archive.close().expect("close");

    let mut archive =
        ResFile::new(Cursor::new(cursor.into_inner()), Mode::Read).expect("open");
    let names = archive.entry_names();
    assert!(names.contains(&"initqu01.lnk".to_string()));
    assert!(names.contains(&"base.fig".to_string()));
    assert!(names.contains(&"hand.bon".to_string()));

    let imported = import_model(&mut archive, "initqu01", false).expect("import");
    assert_eq!(imported.links, model.links);
    assert_eq!(imported.figures.len(), 3);
    assert_eq!(imported.bones.len(), 3);
}

fn animation_part(name: &str, rotations: Vec<Quat>, root: bool) -> Animation {
    Animation {
        name: name.to_string(),
        rotations,
        translations: if root { vec![Vec3::ZERO, Vec3::ZERO] } else { Vec::new() },
        scalings: Vec::new(),
        morphs: Vec::new(),
    }
}

fn sample_set() -> AnimationSet {
    let z90 = Quat::from_rotation_z(FRAC_PI_2);
    AnimationSet::new(vec![
        animation_part("base", vec![z90; 2], true),
        animation_part("arm", vec![z90; 2], false),
        animation_part("hand", vec![z90; 2], false),
    ])
}

#[test]
fn test_animation_roundtrip_through_archive() {
    let set = sample_set();

    let mut cursor = Cursor::new(Vec::new());
    let mut archive = ResFile::new(&mut cursor, Mode::Write).expect("create");
    export_animation(&mut archive, "unmods", "uwalk", &set, AnmOptions::default())
        .expect("export");
    archive.close().expect("close");

    let mut archive =
        ResFile::new(Cursor::new(cursor.into_inner()), Mode::Read).expect("open");
    assert_eq!(archive.animation_names("unmods").unwrap(), vec!["uwalk".to_string()]);

    let imported =
        import_animation(&mut archive, "unmods", "uwalk", AnmOptions::default()).expect("import");
    assert_eq!(imported.len(), 3);
    for want in set.iter() {
        assert_eq!(imported.get(&want.name).expect("part"), want);
    }
}

#[test]
fn test_export_animation_keeps_siblings() {
    let set = sample_set();
    let mut cursor = Cursor::new(Vec::new());
    let mut archive = ResFile::new(&mut cursor, Mode::Write).expect("create");
    export_animation(&mut archive, "unmods", "uwalk", &set, AnmOptions::default())
        .expect("export uwalk");
    export_animation(&mut archive, "unmods", "udeath", &set, AnmOptions::default())
        .expect("export udeath");
    archive.close().expect("close");

    let mut archive =
        ResFile::new(Cursor::new(cursor.into_inner()), Mode::Read).expect("open");
    let mut names = archive.animation_names("unmods").unwrap();
    names.sort();
    assert_eq!(names, vec!["udeath".to_string(), "uwalk".to_string()]);
}

#[test]
fn test_rotation_convention_roundtrip_through_archive() {
    let links = chain_links();
    let z90 = Quat::from_rotation_z(FRAC_PI_2);
    let x30 = Quat::from_axis_angle(Vec3::X, 0.5);
    let mut set = AnimationSet::new(vec![
        animation_part("base", vec![z90, x30], true),
        animation_part("arm", vec![x30, z90], false),
        animation_part("hand", vec![z90 * x30, x30], false),
    ]);
    let original: Vec<(String, Vec<Quat>)> =
        set.iter().map(|p| (p.name.clone(), p.rotations.clone())).collect();

    // file -> absolute -> host, as an importer would do
    set.file_to_absolute(&links).expect("to absolute");
    set.absolute_to_host(&links).expect("to host");

    // store the host-convention set and read it back
    let mut cursor = Cursor::new(Vec::new());
    let mut archive = ResFile::new(&mut cursor, Mode::Write).expect("create");
    export_animation(&mut archive, "unmods", "uwalk", &set, AnmOptions::default())
        .expect("export");
    archive.close().expect("close");
    let mut archive =
        ResFile::new(Cursor::new(cursor.into_inner()), Mode::Read).expect("open");
    let mut reloaded =
        import_animation(&mut archive, "unmods", "uwalk", AnmOptions::default()).expect("import");

    // host -> absolute -> file, as an exporter would do
    reloaded.host_to_absolute(&links).expect("to absolute");
    reloaded.absolute_to_file(&links).expect("to file");

    for (name, want) in &original {
        let part = reloaded.get(name).expect("part");
        for (&got, &want) in part.rotations.iter().zip(want) {
            let diff = (got - want).length().min((got + want).length());
            assert!(diff < 1e-5, "{name}: {got:?} != {want:?}");
        }
    }
}
