//! CLI tool to connect to and exercise a YERC robot controller.
use std::io::{ self, Write };
use std::net::IpAddr;
use std::time::Duration;

use clap;
use yerc::commands::{ ReadCurrentPosition, ReadStatus, ReadUint8Vars, WriteUint8Vars };
use yerc::position::Position;
use yerc::{ Client, Status };

const COMMAND_TIMEOUT: Duration = Duration::from_millis( 500 );
const FILE_TIMEOUT: Duration = Duration::from_secs( 5 );

struct App {
  // The currently connected controller client, if any.
  client: Option<Client>
}

impl App {
  async fn do_connect( &mut self, address: IpAddr ) {
    self.do_disconnect().await;

    match Client::connect( address ).await {
      Ok( client ) => {
        self.client = Some( client );
        println!( "connected to {}", address );
      },
      Err( error ) => {
        println!( "Failed to connect to the controller: {}", error );
      }
    }
  }

  async fn do_disconnect( &mut self ) {
    if let Some( client ) = self.client.take() {
      client.close();
    }
  }

  async fn do_status( &self ) {
    if let Some( client ) = &self.client {
      match client.send_command( &ReadStatus, COMMAND_TIMEOUT ).await {
        Ok( status ) => print_status( &status ),
        Err( error ) => println!( "Status read failed: {}", error )
      }
    } else {
      println!( "(no controller connected)" );
    }
  }

  async fn do_position( &self, control_group: u8 ) {
    if let Some( client ) = &self.client {
      match client.send_command( &ReadCurrentPosition{ control_group }, COMMAND_TIMEOUT ).await {
        Ok( position ) => print_position( &position ),
        Err( error ) => println!( "Position read failed: {}", error )
      }
    } else {
      println!( "(no controller connected)" );
    }
  }

  async fn do_read_u8( &self, index: u8, count: u8 ) {
    if let Some( client ) = &self.client {
      match client.send_command( &ReadUint8Vars{ index, count }, COMMAND_TIMEOUT ).await {
        Ok( values ) => {
          for ( offset, value ) in values.iter().enumerate() {
            println!( "  B{:03} = {}", index as usize + offset, value );
          }
        },
        Err( error ) => println!( "Variable read failed: {}", error )
      }
    } else {
      println!( "(no controller connected)" );
    }
  }

  async fn do_write_u8( &self, index: u8, value: u8 ) {
    if let Some( client ) = &self.client {
      match client.send_command( &WriteUint8Vars{ index, values: vec![value] }, COMMAND_TIMEOUT ).await {
        Ok(()) => println!( "  B{:03} = {}", index, value ),
        Err( error ) => println!( "Variable write failed: {}", error )
      }
    } else {
      println!( "(no controller connected)" );
    }
  }

  async fn do_list_files( &self, pattern: &str ) {
    if let Some( client ) = &self.client {
      match client.read_file_list( pattern, FILE_TIMEOUT ).await {
        Ok( names ) => {
          if names.is_empty() {
            println!( "(no files)" );
          } else {
            for name in names {
              println!( "  {}", name );
            }
          }
        },
        Err( error ) => println!( "File list failed: {}", error )
      }
    } else {
      println!( "(no controller connected)" );
    }
  }
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - Main

#[tokio::main]
async fn main() {
  let _ = tracing_subscriber::fmt()
    .with_writer( io::stderr )
    .with_target( false )
    .try_init();

  let mut input = String::new();
  let mut app = App{ client: None };

  // Define the REPL interface
  let mut cli = clap::Command::new( "yerc" )
    .about( "Connect to and exercise a YERC robot controller." )
    .disable_help_subcommand( true )
    .multicall( true )
    .subcommand_required( true )
    .subcommands([
      clap::Command::new( "connect" )
        .about( "Connects to the controller at `address`." )
        .arg( clap::Arg::new( "address" ).required( true ).value_parser( clap::value_parser!( IpAddr ) ) ),
      clap::Command::new( "disconnect" )
        .about( "Disconnects from the current controller." ),
      clap::Command::new( "exit" ),
      clap::Command::new( "help" ),
      clap::Command::new( "status" )
        .about( "Reads and prints the controller status flags." ),
      clap::Command::new( "position" )
        .about( "Reads the current position of control group `group` (default 1)." )
        .arg( clap::Arg::new( "group" ).value_parser( clap::value_parser!( u8 ) ) ),
      clap::Command::new( "read-u8" )
        .about( "Reads `count` byte variables (default 1) starting at `index`." )
        .arg( clap::Arg::new( "index" ).required( true ).value_parser( clap::value_parser!( u8 ) ) )
        .arg( clap::Arg::new( "count" ).value_parser( clap::value_parser!( u8 ) ) ),
      clap::Command::new( "write-u8" )
        .about( "Writes `value` into the byte variable at `index`." )
        .arg( clap::Arg::new( "index" ).required( true ).value_parser( clap::value_parser!( u8 ) ) )
        .arg( clap::Arg::new( "value" ).required( true ).value_parser( clap::value_parser!( u8 ) ) ),
      clap::Command::new( "files" )
        .about( "Lists controller files matching `pattern` (default `*`)." )
        .arg( clap::Arg::new( "pattern" ) )
    ]);

  // Start the REPL
  loop {
    if app.client.is_some() {
      print!( "[connected]> " );
    } else {
      print!( "> " );
    }

    input.clear();
    let _ = io::stdout().flush();
    if io::stdin().read_line( &mut input ).unwrap_or( 0 ) == 0 {
      break;
    }

    if let Some( args ) = shlex::split( input.trim() ) {
      match cli.try_get_matches_from_mut( args ) {
        Ok( matches ) =>
          match matches.subcommand() {
            Some(( "connect", args )) => app.do_connect( *args.get_one::<IpAddr>( "address" ).unwrap() ).await,
            Some(( "disconnect", _ )) => app.do_disconnect().await,
            Some(( "exit", _ )) => break,
            Some(( "help", _ )) => cli.print_help().unwrap(),
            Some(( "status", _ )) => app.do_status().await,
            Some(( "position", args )) => app.do_position( args.get_one::<u8>( "group" ).copied().unwrap_or( 1 ) ).await,
            Some(( "read-u8", args )) => {
              let index = *args.get_one::<u8>( "index" ).unwrap();
              let count = args.get_one::<u8>( "count" ).copied().unwrap_or( 1 );
              app.do_read_u8( index, count ).await
            },
            Some(( "write-u8", args )) => {
              let index = *args.get_one::<u8>( "index" ).unwrap();
              let value = *args.get_one::<u8>( "value" ).unwrap();
              app.do_write_u8( index, value ).await
            },
            Some(( "files", args )) => {
              let pattern = args.get_one::<String>( "pattern" ).map( String::as_str ).unwrap_or( "*" );
              app.do_list_files( pattern ).await
            },
            _ => {}
          },
        Err( error ) => {
          let _ = error.print();
        }
      }
    }
  }

  app.do_disconnect().await;
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Helpers

fn print_status( status: &Status ) {
  println!( "Cycle:" );
  println!( "  Step = {}", status.step() );
  println!( "  One-cycle = {}", status.one_cycle() );
  println!( "  Continuous = {}", status.continuous() );
  println!( "Mode:" );
  println!( "  Teach = {}", status.teach() );
  println!( "  Play = {}", status.play() );
  println!( "  Remote = {}", status.remote() );
  println!( "State:" );
  println!( "  Running = {}", status.running() );
  println!( "  Speed limited = {}", status.speed_limited() );
  println!( "  Hold (pendant) = {}", status.pendant_hold() );
  println!( "  Hold (external) = {}", status.external_hold() );
  println!( "  Hold (command) = {}", status.command_hold() );
  println!( "  Alarm = {}", status.alarm() );
  println!( "  Error = {}", status.error() );
  println!( "  Servo on = {}", status.servo_on() );
}

fn print_position( position: &Position ) {
  match position {
    Position::Pulse( pulse ) => {
      println!( "Pulse position (tool {}):", pulse.tool );
      for ( index, joint ) in pulse.joints.iter().enumerate() {
        println!( "  Joint {} = {}", index + 1, joint );
      }
    },

    Position::Cartesian( cartesian ) => {
      println!( "Cartesian position (frame {:?}, tool {}):", cartesian.frame, cartesian.tool );
      println!( "  x = {:.3} mm", cartesian.x as f64 / 1e3 );
      println!( "  y = {:.3} mm", cartesian.y as f64 / 1e3 );
      println!( "  z = {:.3} mm", cartesian.z as f64 / 1e3 );
      println!( "  rx = {:.4} deg", cartesian.rx as f64 / 1e4 );
      println!( "  ry = {:.4} deg", cartesian.ry as f64 / 1e4 );
      println!( "  rz = {:.4} deg", cartesian.rz as f64 / 1e4 );
    }
  }
}
