use assert_cmd::cargo;
use predicates::prelude::*;
use std::io::Write;

type STDRESULT = Result<(), Box<dyn std::error::Error>>;

fn sample_data(n: usize) -> Vec<u8> {
    (0..n).map(|i| ((i * 37 + 11) % 256) as u8).collect()
}

#[test]
fn encode_then_decode_round_trips_sp_mode() -> STDRESULT {
    let data = sample_data(20_000);
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&data)?;

    let mut encode = cargo::cargo_bin_cmd!("bkrencode");
    let encoded = encode
        .arg("-D").arg("l")
        .arg("-F").arg("s")
        .arg("-V").arg("n")
        .pipe_stdin(file.path())?
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let mut decode = cargo::cargo_bin_cmd!("bkrencode");
    let mut decoded_file = tempfile::NamedTempFile::new()?;
    decoded_file.write_all(&encoded)?;
    decode
        .arg("-u")
        .arg("-D").arg("l")
        .arg("-F").arg("s")
        .arg("-V").arg("n")
        .pipe_stdin(decoded_file.path())?
        .assert()
        .success()
        .stdout(predicate::eq(data));
    Ok(())
}

#[test]
fn encode_then_decode_round_trips_ep_mode() -> STDRESULT {
    let data = sample_data(9_000);
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&data)?;

    let mut encode = cargo::cargo_bin_cmd!("bkrencode");
    let encoded = encode
        .arg("-D").arg("l")
        .arg("-F").arg("e")
        .arg("-V").arg("n")
        .pipe_stdin(file.path())?
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let mut decode = cargo::cargo_bin_cmd!("bkrencode");
    let mut decoded_file = tempfile::NamedTempFile::new()?;
    decoded_file.write_all(&encoded)?;
    decode
        .arg("-u")
        .arg("-D").arg("l")
        .arg("-F").arg("e")
        .arg("-V").arg("n")
        .pipe_stdin(decoded_file.path())?
        .assert()
        .success()
        .stdout(predicate::eq(data));
    Ok(())
}

#[test]
fn time_only_reports_seconds_without_coding() -> STDRESULT {
    let data = sample_data(5_000);
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(&data)?;

    let mut cmd = cargo::cargo_bin_cmd!("bkrencode");
    cmd.arg("-t")
        .arg("-D").arg("h")
        .arg("-F").arg("e")
        .arg("-V").arg("n")
        .pipe_stdin(file.path())?
        .assert()
        .success()
        .stdout(predicate::str::contains("seconds"));
    Ok(())
}

#[test]
fn rejects_an_unknown_density_flag() -> STDRESULT {
    let mut cmd = cargo::cargo_bin_cmd!("bkrencode");
    cmd.arg("-Dx").arg("-F").arg("e").arg("-V").arg("n").assert().failure();
    Ok(())
}
