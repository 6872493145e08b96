//! Writes a cube as ASCII and binary PLY file and reads both files back in.
//!
//! If file names are passed as arguments, those files are read instead.

use std::{
    env,
    time::Instant,
};

use failure::Error;

use loxply::{Config, Format, PropertyType, Reader, RequestId, ScalarType};


/// A cube with 24 vertices (4 per side, so that each side has its own
/// normals and texture coordinates) and 12 triangles.
struct Cube {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    texcoords: Vec<[f32; 2]>,
    triangles: Vec<[u32; 3]>,
}

impl Cube {
    fn new() -> Self {
        // For each side: the normal and two axes spanning the side.
        let sides: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([ 1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0,  1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0,  1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ];

        let mut cube = Cube {
            positions: vec![],
            normals: vec![],
            texcoords: vec![],
            triangles: vec![],
        };

        for (n, a, b) in &sides {
            let base = cube.positions.len() as u32;
            for &(u, v) in &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let su = u * 2.0 - 1.0;
                let sv = v * 2.0 - 1.0;
                let pos = [
                    n[0] + su * a[0] + sv * b[0],
                    n[1] + su * a[1] + sv * b[1],
                    n[2] + su * a[2] + sv * b[2],
                ];

                cube.positions.push(pos);
                cube.normals.push(*n);
                cube.texcoords.push([u, v]);
            }

            cube.triangles.push([base, base + 1, base + 2]);
            cube.triangles.push([base, base + 2, base + 3]);
        }

        cube
    }
}

fn write_cube(name: &str) -> Result<Vec<String>, Error> {
    let cube = Cube::new();
    let positions: Vec<f32> = cube.positions.iter().flat_map(|p| p.to_vec()).collect();
    let normals: Vec<f32> = cube.normals.iter().flat_map(|p| p.to_vec()).collect();
    let texcoords: Vec<f32> = cube.texcoords.iter().flat_map(|p| p.to_vec()).collect();
    let triangles: Vec<u32> = cube.triangles.iter().flat_map(|t| t.to_vec()).collect();

    let mut writer = Config::ascii().add_comment("generated by loxply").into_writer();
    writer
        .provide_values("vertex", &["x", "y", "z"], &positions)?
        .provide_values("vertex", &["nx", "ny", "nz"], &normals)?
        .provide_values("vertex", &["u", "v"], &texcoords)?
        .provide_values_list("face", "vertex_indices", ScalarType::UChar, 3, &triangles)?;

    let ascii = format!("{}-ascii.ply", name);
    writer.write_to_file(&ascii)?;

    let binary = format!("{}-binary.ply", name);
    writer.set_format(Format::binary_native());
    writer.write_to_file(&binary)?;

    Ok(vec![ascii, binary])
}

fn read_file(path: &str) -> Result<(), Error> {
    println!("........................................................................");
    println!("Now reading: {}", path);

    let before = Instant::now();
    let mut reader = Reader::open(path)?;

    // ----- Print header ---------------------------------------------------
    let kind = if reader.header().is_binary() { "binary" } else { "ascii" };
    println!("\t[ply_header] Type: {}", kind);
    for c in reader.comments() {
        println!("\t[ply_header] Comment: {}", c);
    }
    for info in reader.obj_info() {
        println!("\t[ply_header] Info: {}", info);
    }
    for e in reader.elements() {
        println!("\t[ply_header] element: {} ({})", e.name, e.count);
        for p in &e.property_defs {
            match p.ty {
                PropertyType::Scalar(ty) => {
                    println!("\t[ply_header] \tproperty: {} (type={})", p.name, ty);
                }
                PropertyType::List { len_type, scalar_type } => {
                    println!(
                        "\t[ply_header] \tproperty: {} (type={}) (list_type={})",
                        p.name,
                        scalar_type,
                        len_type,
                    );
                }
            }
        }
    }

    // ----- Request properties ---------------------------------------------
    // Not every file has all of these, so failed requests are just printed.
    let mut request = |element: &str, names: &[&str]| {
        match reader.request(element, names) {
            Ok(id) => Some(id),
            Err(e) => {
                eprintln!("\trequest failed: {}", e);
                None
            }
        }
    };
    let vertices = request("vertex", &["x", "y", "z"]);
    let normals = request("vertex", &["nx", "ny", "nz"]);
    let colors = request("vertex", &["red", "green", "blue", "alpha"]);
    let texcoords = request("vertex", &["u", "v"]);
    let faces = request("face", &["vertex_indices"]);

    reader.set_progress_callback(10_000_000, |info| {
        if let Some(fraction) = info.fraction() {
            println!("\tprogress: {:.1}%", fraction * 100.0);
        }
    });

    if let Err(e) = reader.read() {
        eprintln!("\tread failed: {}", e);
    }

    let secs = before.elapsed().as_secs_f64();
    let size_mb = std::fs::metadata(path)?.len() as f64 * 1e-6;
    println!("\tparsing {:.3}mb in {:.6} seconds [{:.1} MBps]", size_mb, secs, size_mb / secs);

    let mut take = |id: Option<RequestId>, what: &str| {
        let data = id.and_then(|id| reader.take(id));
        if let Some(data) = &data {
            println!("\tRead {} total {}", data.count(), what);
        }
        data
    };
    let vertices = take(vertices, "vertices");
    take(normals, "vertex normals");
    take(colors, "vertex colors");
    take(texcoords, "vertex texcoords");
    let faces = take(faces, "faces");

    // ----- Convert to application types -----------------------------------
    if let Some(positions) = vertices.and_then(|v| v.values::<f32>()) {
        let points: Vec<[f32; 3]> = positions.chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect();
        println!("\tfirst vertex: {:?}", points.first());
    }

    // Lists can have a different length in each row.
    if let Some(faces) = faces {
        let mut triangles = 0;
        let mut quads = 0;
        let mut n_gons = 0;
        for &len in faces.list_lengths() {
            match len {
                3 => triangles += 1,
                4 => quads += 1,
                _ => n_gons += 1,
            }
        }

        println!("\tRead {} total triangles, {} quads, {} n-gons", triangles, quads, n_gons);
    }

    Ok(())
}

fn main() -> Result<(), Error> {
    color_backtrace::install();

    let args: Vec<String> = env::args().skip(1).collect();
    let files = if args.is_empty() {
        write_cube("example_cube")?
    } else {
        args
    };

    for file in &files {
        read_file(file)?;
    }

    Ok(())
}
