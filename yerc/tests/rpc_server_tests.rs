use std::net::{ IpAddr, Ipv4Addr };
use std::sync::atomic::{ AtomicBool, AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use tokio::sync::Notify;

use yerc::commands::ReadUint8Vars;
use yerc::rpc_server::disabled_service;
use yerc::{ AnyResponse, Client, ClientConfig, ErrorKind, RpcServer };
use yerc_test::Emulator;

const BASE_REGISTER: u8 = 50;
const POLL_DELAY: Duration = Duration::from_millis( 5 );

async fn connect( emulator: &Emulator ) -> Arc<Client> {
  let client = ClientConfig::new( IpAddr::V4( Ipv4Addr::LOCALHOST ) )
    .robot_address( emulator.robot_address() )
    .file_address( emulator.file_address() )
    .connect().await
    .expect( "failed to connect to the emulator" );
  Arc::new( client )
}

// A shared error sink that records every reported message.
fn recording_sink() -> ( Arc<Mutex<Vec<String>>>, Box<dyn Fn( yerc::Error ) + Send + Sync> ) {
  let messages: Arc<Mutex<Vec<String>>> = Arc::new( Mutex::new( Vec::new() ) );
  let sink = {
    let messages = messages.clone();
    Box::new( move | error: yerc::Error |{
      messages.lock().unwrap().push( error.to_string() );
    }) as Box<dyn Fn( yerc::Error ) + Send + Sync>
  };
  ( messages, sink )
}

async fn wait_until( what: &str, mut predicate: impl FnMut() -> bool ) {
  for _ in 0..200 {
    if predicate() {
      return;
    }
    tokio::time::sleep( Duration::from_millis( 10 ) ).await;
  }
  panic!( "timed out waiting until {what}" );
}

// - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -  Tests

#[tokio::test]
async fn a_requested_service_runs_and_returns_to_idle() {
  let emulator = Emulator::start().await.unwrap();
  let client = connect( &emulator ).await;

  let ran = Arc::new( AtomicBool::new( false ) );
  let mut server = RpcServer::new( client, BASE_REGISTER, POLL_DELAY, | _ |{} );
  server.add_service( "beep", {
    let ran = ran.clone();
    move ||{
      let ran = ran.clone();
      async move {
        ran.store( true, Ordering::SeqCst );
        Ok(())
      }
    }
  }).unwrap();

  assert!( server.start() );
  emulator.set_u8_var( BASE_REGISTER, 1 );

  wait_until( "the status register returns to idle", ||{ emulator.u8_var( BASE_REGISTER ) == 0 }).await;
  assert!( ran.load( Ordering::SeqCst ) );

  assert!( server.stop() );
}

#[tokio::test]
async fn a_busy_service_is_not_entered_twice() {
  let emulator = Emulator::start().await.unwrap();
  let client = connect( &emulator ).await;

  let entered = Arc::new( AtomicUsize::new( 0 ) );
  let gate = Arc::new( Notify::new() );

  let mut server = RpcServer::new( client, BASE_REGISTER, POLL_DELAY, | _ |{} );
  server.add_service( "slow", {
    let entered = entered.clone();
    let gate = gate.clone();
    move ||{
      let entered = entered.clone();
      let gate = gate.clone();
      async move {
        entered.fetch_add( 1, Ordering::SeqCst );
        gate.notified().await;
        Ok(())
      }
    }
  }).unwrap();

  assert!( server.start() );
  emulator.set_u8_var( BASE_REGISTER, 1 );
  wait_until( "the handler is entered", ||{ entered.load( Ordering::SeqCst ) == 1 }).await;

  // The register still reads `requested` while the handler is blocked, so
  // every poll in between sees it; none of them may enter the handler.
  tokio::time::sleep( Duration::from_millis( 100 ) ).await;
  assert_eq!( entered.load( Ordering::SeqCst ), 1 );

  gate.notify_one();
  wait_until( "the status register returns to idle", ||{ emulator.u8_var( BASE_REGISTER ) == 0 }).await;

  // A new request enters the handler again.
  emulator.set_u8_var( BASE_REGISTER, 1 );
  wait_until( "the handler is entered again", ||{ entered.load( Ordering::SeqCst ) == 2 }).await;

  gate.notify_one();
  wait_until( "the status register returns to idle", ||{ emulator.u8_var( BASE_REGISTER ) == 0 }).await;

  server.stop();
}

#[tokio::test]
async fn precondition_results_are_passed_to_the_handler() {
  let emulator = Emulator::start().await.unwrap();
  emulator.set_u8_var( 7, 42 );

  let client = connect( &emulator ).await;
  let received = Arc::new( Mutex::new( None ) );

  let mut server = RpcServer::new( client, BASE_REGISTER, POLL_DELAY, | _ |{} );
  server.add_service_with_commands(
    "fetch",
    vec![ ReadUint8Vars{ index: 7, count: 1 }.into() ],
    Duration::from_millis( 100 ),
    {
      let received = received.clone();
      move | responses: Vec<AnyResponse> |{
        let received = received.clone();
        async move {
          *received.lock().unwrap() = Some( responses );
          Ok(())
        }
      }
    }
  ).unwrap();

  assert!( server.start() );
  emulator.set_u8_var( BASE_REGISTER, 1 );
  wait_until( "the status register returns to idle", ||{ emulator.u8_var( BASE_REGISTER ) == 0 }).await;

  let responses = received.lock().unwrap().clone().expect( "the handler did not run" );
  assert_eq!( responses, vec![ AnyResponse::Uint8( vec![42] ) ] );

  server.stop();
}

#[tokio::test]
async fn a_failing_precondition_skips_the_handler_and_writes_error() {
  let emulator = Emulator::start().await.unwrap();
  let client = connect( &emulator ).await;

  let ( messages, sink ) = recording_sink();
  let called = Arc::new( AtomicBool::new( false ) );

  let mut server = RpcServer::new( client, BASE_REGISTER, POLL_DELAY, sink );
  server.add_service_with_commands(
    "park",
    // Reading past the end of the variable bank fails on the controller.
    vec![ ReadUint8Vars{ index: 250, count: 10 }.into() ],
    Duration::from_millis( 100 ),
    {
      let called = called.clone();
      move | _responses: Vec<AnyResponse> |{
        let called = called.clone();
        async move {
          called.store( true, Ordering::SeqCst );
          Ok(())
        }
      }
    }
  ).unwrap();

  assert!( server.start() );
  emulator.set_u8_var( BASE_REGISTER, 1 );
  wait_until( "the status register reports the error", ||{ emulator.u8_var( BASE_REGISTER ) == 2 }).await;

  assert!( !called.load( Ordering::SeqCst ) );

  let messages = messages.lock().unwrap().clone();
  assert!( messages.iter().any( | message |{
    message.contains( "executing service park" ) && message.contains( "status 0x09" )
  }), "unexpected error messages: {messages:?}" );

  server.stop();
}

#[tokio::test]
async fn a_disabled_service_resolves_with_an_error_status() {
  let emulator = Emulator::start().await.unwrap();
  let client = connect( &emulator ).await;

  let ( messages, sink ) = recording_sink();
  let mut server = RpcServer::new( client, BASE_REGISTER, POLL_DELAY, sink );
  server.add_service_handler( "spare", disabled_service() ).unwrap();

  assert!( server.start() );
  emulator.set_u8_var( BASE_REGISTER, 1 );
  wait_until( "the status register reports the error", ||{ emulator.u8_var( BASE_REGISTER ) == 2 }).await;

  let messages = messages.lock().unwrap().clone();
  assert!( messages.iter().any( | message |{
    message.contains( "executing service spare" ) && message.contains( "service is disabled" )
  }), "unexpected error messages: {messages:?}" );

  server.stop();
}

#[tokio::test]
async fn start_and_stop_report_whether_the_state_changed() {
  let emulator = Emulator::start().await.unwrap();
  let client = connect( &emulator ).await;

  let mut server = RpcServer::new( client, BASE_REGISTER, POLL_DELAY, | _ |{} );
  server.add_service( "noop", ||{ async { Ok(()) } }).unwrap();

  assert!( !server.stop() );
  assert!( server.start() );
  assert!( !server.start() );
  assert!( server.stop() );
  assert!( !server.stop() );
}

#[tokio::test]
async fn no_poll_is_scheduled_after_stop() {
  let emulator = Emulator::start().await.unwrap();
  let client = connect( &emulator ).await;

  let mut server = RpcServer::new( client, BASE_REGISTER, POLL_DELAY, | _ |{} );
  server.add_service( "noop", ||{ async { Ok(()) } }).unwrap();

  assert!( server.start() );
  tokio::time::sleep( Duration::from_millis( 50 ) ).await;
  assert!( server.stop() );

  // A request raised after the stop is never picked up.
  tokio::time::sleep( Duration::from_millis( 20 ) ).await;
  emulator.set_u8_var( BASE_REGISTER, 1 );
  tokio::time::sleep( Duration::from_millis( 100 ) ).await;
  assert_eq!( emulator.u8_var( BASE_REGISTER ), 1 );
}

#[tokio::test]
async fn services_cannot_be_registered_while_started() {
  let emulator = Emulator::start().await.unwrap();
  let client = connect( &emulator ).await;

  let mut server = RpcServer::new( client, BASE_REGISTER, POLL_DELAY, | _ |{} );
  server.add_service( "first", ||{ async { Ok(()) } }).unwrap();

  assert!( server.start() );
  let error = server.add_service( "second", ||{ async { Ok(()) } }).unwrap_err();
  assert_eq!( error.kind(), ErrorKind::InvalidArgument );

  server.stop();
}

#[tokio::test]
async fn the_status_block_must_fit_the_variable_index_space() {
  let emulator = Emulator::start().await.unwrap();
  let client = connect( &emulator ).await;

  let mut server = RpcServer::new( client, 255, POLL_DELAY, | _ |{} );
  let error = server.add_service( "beyond", ||{ async { Ok(()) } }).unwrap_err();
  assert_eq!( error.kind(), ErrorKind::InvalidArgument );
}

#[tokio::test]
async fn polling_continues_after_a_read_failure() {
  let emulator = Emulator::start().await.unwrap();
  let client = connect( &emulator ).await;

  let ( messages, sink ) = recording_sink();
  let ran = Arc::new( AtomicBool::new( false ) );

  let mut server = RpcServer::new( client, BASE_REGISTER, POLL_DELAY, sink );
  server.add_service( "beep", {
    let ran = ran.clone();
    move ||{
      let ran = ran.clone();
      async move {
        ran.store( true, Ordering::SeqCst );
        Ok(())
      }
    }
  }).unwrap();

  // The first poll fails; the loop must keep going.
  emulator.fail_next_command( 0x28, 0x0000 );

  assert!( server.start() );
  wait_until( "the read failure is reported", ||{
    messages.lock().unwrap().iter().any( | message |{
      message.contains( "reading commands status variables" )
    })
  }).await;

  emulator.set_u8_var( BASE_REGISTER, 1 );
  wait_until( "the status register returns to idle", ||{ emulator.u8_var( BASE_REGISTER ) == 0 }).await;
  assert!( ran.load( Ordering::SeqCst ) );

  server.stop();
}
