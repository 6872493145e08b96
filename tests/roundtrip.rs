//! Round trips through the public API: files, streams and large data.

use std::{
    cell::Cell,
    env,
    fs,
    io::{self, Read},
    path::PathBuf,
    process,
    rc::Rc,
};

use failure::Error;

use loxply::{Config, Format, Reader, ScalarType};


fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(format!("loxply-{}-{}.ply", process::id(), name))
}

/// Reader that hands out data in small, odd-sized pieces.
struct Chunky<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl Read for Chunky<'_> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk.min(out.len()).min(self.data.len());
        out[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

#[test]
fn file_roundtrip() -> Result<(), Error> {
    let positions: Vec<f64> = (0..300).map(|i| i as f64 * 0.25).collect();
    let indices: Vec<i32> = (0..400).collect();

    for &format in &[Format::Ascii, Format::BinaryLittleEndian, Format::BinaryBigEndian] {
        let path = temp_path(&format!("file-{}", format));

        let mut writer = Config::new(format).add_comment("round trip").into_writer();
        writer
            .provide_values("vertex", &["x", "y", "z"], &positions)?
            .provide_values_list("face", "vertex_indices", ScalarType::UShort, 4, &indices)?;
        writer.write_to_file(&path)?;

        let mut reader = Reader::open(&path)?;
        assert_eq!(reader.format(), format);
        assert_eq!(reader.comments(), &["round trip".to_string()]);

        let pos = reader.request("vertex", &["x", "y", "z"])?;
        let faces = reader.request_with_hint("face", &["vertex_indices"], 4)?;
        reader.read()?;

        let pos = reader.take(pos).unwrap();
        assert_eq!(pos.count(), 100);
        assert_eq!(pos.values::<f64>(), Some(positions.clone()));

        let faces = reader.take(faces).unwrap();
        assert_eq!(faces.count(), 100);
        assert!(faces.list_lengths().iter().all(|&len| len == 4));
        assert_eq!(faces.values::<i32>(), Some(indices.clone()));

        fs::remove_file(&path)?;
    }

    Ok(())
}

#[test]
fn streaming_reader() -> Result<(), Error> {
    let values: Vec<u16> = (0..5000).map(|i| (i * 7) as u16).collect();

    for &format in &[Format::Ascii, Format::BinaryBigEndian] {
        let mut writer = Config::new(format).into_writer();
        writer.provide_values("point", &["a", "b"], &values)?;
        let file = writer.write_to_memory()?;

        for &chunk in &[1, 3, 1000] {
            let mut reader = Reader::new(Chunky { data: &file, chunk })?;
            let b = reader.request("point", &["b"])?;
            reader.read()?;

            let expected: Vec<u16> = values.iter().skip(1).step_by(2).cloned().collect();
            assert_eq!(reader.data(b).unwrap().values::<u16>(), Some(expected));
        }
    }

    Ok(())
}

#[test]
fn large_binary_lists() -> Result<(), Error> {
    // Each list is bigger than the internal parse buffer.
    let list_len = 100_000;
    let values: Vec<f32> = (0..3 * list_len).map(|i| i as f32).collect();

    let mut writer = Config::new(Format::BinaryBigEndian).into_writer();
    writer
        .provide_values("before", &["v"], &[1u8, 2])?
        .provide_values_list("big", "data", ScalarType::UInt, list_len, &values)?
        .provide_values("after", &["v"], &[3u8, 4])?;
    let file = writer.write_to_memory()?;

    // Skip the big lists
    let mut reader = Reader::from_bytes(&file)?;
    let after = reader.request("after", &["v"])?;
    reader.read()?;
    assert_eq!(reader.data(after).unwrap().values::<u8>(), Some(vec![3, 4]));

    // Read the big lists
    let mut reader = Reader::from_bytes(&file)?;
    let big = reader.request("big", &["data"])?;
    reader.read()?;
    let big = reader.take(big).unwrap();
    assert_eq!(big.list_lengths(), &[list_len as u32; 3]);
    assert_eq!(big.list_rows().map(|row| row.len()).collect::<Vec<_>>(), vec![4 * list_len; 3]);
    assert_eq!(big.values::<f32>(), Some(values));

    Ok(())
}

#[test]
fn progress_with_streams() -> Result<(), Error> {
    let values: Vec<u64> = (0..10_000).collect();
    let mut writer = Config::binary().into_writer();
    writer.provide_values("vertex", &["id"], &values)?;
    let file = writer.write_to_memory()?;

    let last_total = Rc::new(Cell::new(None));
    let calls = Rc::new(Cell::new(0));

    let mut reader = Reader::new(Chunky { data: &file, chunk: 4096 })?
        .with_input_len(file.len() as u64);
    {
        let last_total = last_total.clone();
        let calls = calls.clone();
        reader.set_progress_callback(8 * 1000, move |info| {
            last_total.set(info.bytes_total);
            calls.set(calls.get() + 1);
            assert!(info.fraction().unwrap() <= 1.0);
        });
    }
    reader.read()?;

    assert_eq!(last_total.get(), Some(file.len() as u64));
    assert!(calls.get() >= 9 && calls.get() <= 10);

    Ok(())
}

#[test]
fn open_missing_file() {
    match Reader::open(temp_path("does-not-exist")) {
        Err(loxply::Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}
