use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fleetscan::nmap::{self, PortSelection, ScanOption, ScanSpec, ScanType};
use fleetscan::sqlmap::{self, DumpIntent, DumpSpec, Tuning};

fn dump_transcript(rows: usize) -> String {
    let mut out = String::from("Database: app_db\nTable: users\n[entries]\n");
    out.push_str("+----+----------+----------------------------------+\n");
    out.push_str("| id | username | password                         |\n");
    out.push_str("+----+----------+----------------------------------+\n");
    for i in 0..rows {
        out.push_str(&format!("| {:<2} | user{:<4} | 5f4dcc3b5aa765d61d8327deb882cf99 |\n", i, i));
    }
    out.push_str("+----+----------+----------------------------------+\n");
    out
}

fn tables_transcript(tables: usize) -> String {
    let mut out = String::from("Database: app_db\n+------------+\n");
    for i in 0..tables {
        out.push_str(&format!("| table_{:<4} |\n", i % (tables / 2 + 1)));
    }
    out.push_str("+------------+\n");
    out
}

fn scan_xml(hosts: usize) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?>\n<nmaprun scanner=\"nmap\">\n");
    for h in 0..hosts {
        out.push_str(&format!(
            "<host><status state=\"up\"/><address addr=\"10.0.{}.{}\" addrtype=\"ipv4\"/><ports>",
            h / 250,
            h % 250 + 1
        ));
        for port in [22, 80, 443, 3306] {
            out.push_str(&format!(
                "<port protocol=\"tcp\" portid=\"{}\"><state state=\"open\"/><service name=\"svc\" product=\"p\" version=\"1\"/><script id=\"banner\" output=\"x\"/></port>",
                port
            ));
        }
        out.push_str("</ports><os><osmatch name=\"Linux 5.X\"/></os></host>\n");
    }
    out.push_str("</nmaprun>\n");
    out
}

fn sqlmap_parser_benchmark(c: &mut Criterion) {
    let dump = dump_transcript(1000);
    let tables = tables_transcript(500);

    c.bench_function("parse_table_dump", |b| {
        b.iter(|| sqlmap::parse_table_dump(black_box(&dump), 5))
    });

    c.bench_function("parse_tables", |b| {
        b.iter(|| sqlmap::parse_tables(black_box(&tables)))
    });
}

fn nmap_normalize_benchmark(c: &mut Criterion) {
    let xml = scan_xml(256);

    c.bench_function("nmap_parse_and_normalize", |b| {
        b.iter(|| {
            let run = nmap::parse_xml(black_box(&xml)).unwrap();
            nmap::normalize(&run)
        })
    });
}

fn command_builder_benchmark(c: &mut Criterion) {
    let scan = ScanSpec::new(["10.0.0.0/24", "10.0.1.0/24"])
        .ports(PortSelection::Split { tcp: (1..200).collect(), udp: vec![53, 161] })
        .scan_type(ScanType::Syn)
        .option(ScanOption::ServiceVersion)
        .option(ScanOption::OsDetect);
    let dump = DumpSpec::new(DumpIntent::DumpColumn, "http://10.0.0.5/item.php?id=1")
        .database("app_db")
        .table("users")
        .column("password")
        .tuning(Tuning {
            threads: Some(8),
            tamper: vec!["space2comment".into()],
            ..Default::default()
        });

    c.bench_function("nmap_build_arguments", |b| {
        b.iter(|| nmap::build_arguments(black_box(&scan)).unwrap())
    });

    c.bench_function("sqlmap_build_command", |b| {
        b.iter(|| sqlmap::build_command(black_box(&dump)).unwrap())
    });
}

criterion_group!(
    benches,
    sqlmap_parser_benchmark,
    nmap_normalize_benchmark,
    command_builder_benchmark
);
criterion_main!(benches);
